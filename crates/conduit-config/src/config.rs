//! Top-level configuration.

use std::net::SocketAddr;
use std::time::Duration;

use conduit_telemetry::{LogConfig, TelemetryConfig};
use serde::Deserialize;

use crate::schema::{
    AdmissionConfig, ArchiveBackendKind, ArchiveConfig, AuthzBackendKind, AuthzConfig,
    QueueBackendKind, QueueConfig, ServerConfig,
};
use crate::ConfigError;

/// Complete gateway configuration.
///
/// Every section is optional in a file; missing sections take their
/// defaults. Unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConduitConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Body admission.
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Queue routing.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Retention archive.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Authorization.
    #[serde(default)]
    pub authz: AuthzConfig,

    /// Logging, metrics and tracing.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ConduitConfig {
    /// Local-development preset: pretty debug logs, no metrics listener.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = LogConfig::development();
        config.telemetry.metrics.enabled = false;
        config
    }

    /// Parsed [`ServerConfig::http_addr`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the address does not parse.
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .http_addr
            .parse()
            .map_err(|e| ConfigError::invalid_value("server.http_addr", format!("{e}")))
    }

    /// Graceful shutdown deadline.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Per-request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let http_addr = self.http_addr()?;

        if self.server.max_connections == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_connections",
                "must be greater than 0",
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.admission.max_message_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "admission.max_message_bytes",
                "must be greater than 0",
            ));
        }

        if self.queue.backend == QueueBackendKind::Spool && self.queue.spool_dir.is_none() {
            return Err(ConfigError::missing_field("queue.spool_dir"));
        }

        if self.queue.backend == QueueBackendKind::Memory && self.queue.memory_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "queue.memory_capacity",
                "must be greater than 0",
            ));
        }

        if self.archive.backend == ArchiveBackendKind::Fs && self.archive.root_dir.is_none() {
            return Err(ConfigError::missing_field("archive.root_dir"));
        }
        if self.archive.backend == ArchiveBackendKind::Memory && self.archive.memory_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "archive.memory_capacity",
                "must be greater than 0",
            ));
        }

        if self.authz.backend == AuthzBackendKind::Remote {
            match self.authz.remote_url.as_deref() {
                None | Some("") => return Err(ConfigError::missing_field("authz.remote_url")),
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    return Err(ConfigError::invalid_value(
                        "authz.remote_url",
                        "must be an http or https URL",
                    ));
                }
                Some(_) => {}
            }
        }

        let metrics = &self.telemetry.metrics;
        if metrics.enabled {
            let metrics_addr = metrics
                .socket_addr()
                .map_err(|e| ConfigError::invalid_value("telemetry.metrics.addr", e.to_string()))?;
            if metrics_addr.port() == http_addr.port() {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.addr",
                    format!("port {} is already used by server.http_addr", http_addr.port()),
                ));
            }
        }

        let ratio = self.telemetry.tracing.sample_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::invalid_value(
                "telemetry.tracing.sample_ratio",
                format!("{ratio} is outside [0, 1]"),
            ));
        }

        Ok(())
    }
}
