//! Typed configuration for Conduit.
//!
//! [`ConduitConfig`] groups every setting the gateway binary needs:
//!
//! - [`ServerConfig`] - bind address, timeouts, connection limit
//! - [`AdmissionConfig`] - message ceiling and drain limit
//! - [`QueueConfig`] - queue backend, naming, provisioning cache
//! - [`ArchiveConfig`] - archive backend
//! - [`AuthzConfig`] - static tenant table or remote service
//! - [`TelemetryConfig`](conduit_telemetry::TelemetryConfig) - logging, metrics, tracing
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//!
//! [admission]
//! max_message_bytes = 262144
//!
//! [queue]
//! backend = "spool"
//! spool_dir = "/var/spool/conduit"
//!
//! [archive]
//! backend = "fs"
//! root_dir = "/var/lib/conduit/archive"
//!
//! [authz.tenants.acme]
//! api_keys = ["..."]
//!
//! [authz.tenants.acme.streams.clicks]
//! retention = "THREE_MONTHS"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Scalar settings can be overridden as `CONDUIT__SECTION__KEY`, e.g.
//! `CONDUIT__ADMISSION__MAX_MESSAGE_BYTES=65536` or
//! `CONDUIT__TELEMETRY__METRICS__ENABLED=false`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::ConduitConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use schema::{
    AdmissionConfig, ArchiveBackendKind, ArchiveConfig, AuthzBackendKind, AuthzConfig,
    QueueBackendKind, QueueConfig, ServerConfig,
};
