//! Tenant-visible diagnostics.
//!
//! Diagnostics tell a tenant why something about their own traffic did not go
//! as expected (a skipped archive, a missing media type). They are not
//! operator alerts and never fail a request.

use crate::ids::TenantId;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Tracing target used for diagnostics emitted through [`TracingDiagnostics`].
pub const DIAGNOSTICS_TARGET: &str = "tenant_diagnostics";

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Informational, e.g. a queue was provisioned.
    Info,
    /// Something the tenant likely wants to fix.
    Warn,
}

impl DiagnosticLevel {
    /// Returns the level as a lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel for messages addressed to a tenant.
pub trait DiagnosticsSink: Send + Sync {
    /// Records a diagnostic for `tenant`.
    fn emit(&self, tenant: &TenantId, level: DiagnosticLevel, message: &str);

    /// Records a warning for `tenant`.
    fn warn(&self, tenant: &TenantId, message: &str) {
        self.emit(tenant, DiagnosticLevel::Warn, message);
    }

    /// Records an informational message for `tenant`.
    fn info(&self, tenant: &TenantId, message: &str) {
        self.emit(tenant, DiagnosticLevel::Info, message);
    }
}

/// Emits diagnostics as tracing events on [`DIAGNOSTICS_TARGET`].
///
/// A log pipeline can route that target into per-tenant storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn emit(&self, tenant: &TenantId, level: DiagnosticLevel, message: &str) {
        match level {
            DiagnosticLevel::Info => {
                tracing::info!(target: DIAGNOSTICS_TARGET, tenant = %tenant, "{message}");
            }
            DiagnosticLevel::Warn => {
                tracing::warn!(target: DIAGNOSTICS_TARGET, tenant = %tenant, "{message}");
            }
        }
    }
}

/// A recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Tenant the diagnostic is addressed to.
    pub tenant: TenantId,
    /// Severity.
    pub level: DiagnosticLevel,
    /// Message text.
    pub message: String,
}

/// Keeps diagnostics in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemoryDiagnostics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Returns recorded diagnostics at `level`.
    #[must_use]
    pub fn at_level(&self, level: DiagnosticLevel) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.level == level)
            .cloned()
            .collect()
    }

    /// Number of warnings recorded.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warn)
            .count()
    }

    /// Discards everything recorded.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn emit(&self, tenant: &TenantId, level: DiagnosticLevel, message: &str) {
        self.entries.lock().push(Diagnostic {
            tenant: tenant.clone(),
            level,
            message: message.to_string(),
        });
    }
}
