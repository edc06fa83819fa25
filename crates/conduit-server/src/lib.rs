//! Conduit Server
//!
//! HTTP transport for the Conduit ingestion gateway:
//!
//! - [`Server`] - accept loop with a connection cap and graceful shutdown
//! - [`IngestService`] - maps requests onto the [`Gateway`](conduit_gateway::Gateway)
//!   and its reports onto status codes and JSON error envelopes
//! - [`bootstrap`] - builds the configured backends and injects them
//!
//! # Endpoints
//!
//! - `POST /v1/tenant/{tenant}/stream/{stream}/message` - `204` once the
//!   message is on its queue
//! - `GET /health` - liveness
//! - `GET /ready` - readiness, `503` while draining

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
mod error;
pub mod health;
pub mod routes;
mod server;
pub mod service;
pub mod shutdown;

pub use error::ServerError;
pub use health::{HealthCheck, HealthStatus, Readiness, ReadinessStatus};
pub use routes::{API_KEY_HEADER, REQUEST_ID_HEADER};
pub use server::Server;
pub use service::IngestService;
pub use shutdown::{ConnectionTracker, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
