//! Liveness and readiness.
//!
//! `/health` answers as long as the process serves requests. `/ready`
//! flips to unavailable once shutdown begins so load balancers stop routing
//! new messages here while in-flight ones finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

/// Body of `/health`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Always `"healthy"` while the process answers.
    pub status: &'static str,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
}

/// Liveness probe.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    service: String,
    version: String,
    started: Instant,
}

impl HealthCheck {
    /// Creates a probe reporting `service` at `version`.
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            started: Instant::now(),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            service: self.service.clone(),
            version: self.version.clone(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

/// Body of `/ready`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ReadinessStatus {
    /// Whether new messages should be routed here.
    pub ready: bool,
    /// Whether shutdown has begun.
    pub draining: bool,
}

/// Readiness probe, shared between the accept loop and request handlers.
#[derive(Debug, Clone)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    /// Creates a ready probe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Marks the server as draining.
    pub fn set_draining(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Whether the server accepts new work.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ReadinessStatus {
        let ready = self.is_ready();
        ReadinessStatus {
            ready,
            draining: !ready,
        }
    }
}
