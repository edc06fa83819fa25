//! Server startup and runtime errors.

use std::net::SocketAddr;

use conduit_archive::ArchiveError;
use conduit_authz::AuthzError;
use conduit_config::ConfigError;
use conduit_router::QueueError;
use conduit_telemetry::TelemetryError;
use thiserror::Error;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telemetry could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The queue backend could not be opened.
    #[error("queue backend error: {0}")]
    Queue(#[from] QueueError),

    /// The archive backend could not be opened.
    #[error("archive backend error: {0}")]
    Archive(#[from] ArchiveError),

    /// The authorization backend could not be built.
    #[error("authorization backend error: {0}")]
    Authz(#[from] AuthzError),

    /// I/O failure while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Returns `true` if the error happened before any backend was built.
    #[must_use]
    pub const fn is_startup_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Telemetry(_))
    }
}
