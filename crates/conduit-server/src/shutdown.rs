//! Graceful shutdown and connection accounting.
//!
//! [`ShutdownSignal`] is a cloneable one-shot latch. [`ConnectionTracker`]
//! caps concurrent connections and lets shutdown wait for the last one to
//! close.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify, OwnedSemaphorePermit, Semaphore};

/// A latch that flips once from running to shutting down.
///
/// ```rust
/// use conduit_server::ShutdownSignal;
///
/// let shutdown = ShutdownSignal::new();
/// let observer = shutdown.clone();
/// shutdown.trigger();
/// assert!(observer.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Creates a signal triggered by SIGTERM or SIGINT.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });
        signal
    }

    /// Triggers shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_if_modified(|state| !std::mem::replace(state, true));
    }

    /// Returns `true` once shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes when shutdown is triggered, immediately if it already was.
    pub async fn recv(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, draining"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, draining"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Failed to register signal handlers, falling back to Ctrl+C");
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, draining"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutdown only via trigger");
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug)]
struct TrackerState {
    active: AtomicUsize,
    idle: Notify,
}

/// Caps and counts open connections.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    permits: Arc<Semaphore>,
    state: Arc<TrackerState>,
    max: usize,
}

impl ConnectionTracker {
    /// Creates a tracker admitting at most `max` concurrent connections.
    #[must_use]
    pub fn new(max: usize) -> Self {
        let max = max.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            state: Arc::new(TrackerState {
                active: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            max,
        }
    }

    /// Connection limit.
    #[must_use]
    pub const fn max_connections(&self) -> usize {
        self.max
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> ConnectionToken {
        // The semaphore is never closed.
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok();
        self.token(permit)
    }

    /// Takes a free slot if one is available.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ConnectionToken> {
        let permit = Arc::clone(&self.permits).try_acquire_owned().ok()?;
        Some(self.token(Some(permit)))
    }

    fn token(&self, permit: Option<OwnedSemaphorePermit>) -> ConnectionToken {
        self.state.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            _permit: permit,
            state: Arc::clone(&self.state),
        }
    }

    /// Open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Completes once no connection is open.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            if self.active_connections() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One open connection. Dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionToken {
    _permit: Option<OwnedSemaphorePermit>,
    state: Arc<TrackerState>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.state.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.idle.notify_waiters();
        }
    }
}
