//! Conduit Gateway
//!
//! The per-message pipeline of the ingestion gateway:
//!
//! - [`AdmissionController`] bounds how much of a body is read
//! - [`Gateway`] sequences authorization, admission, queue routing and
//!   conditional archival, and maps the result to an [`Outcome`]
//!
//! Backends are injected as trait objects, so the same gateway runs over the
//! in-memory doubles in tests and the configured backends in the server.
//!
//! ```rust,ignore
//! let gateway = Gateway::new(authorizer, router, archive, diagnostics)
//!     .with_admission(AdmissionController::new(256 * 1024));
//! let report = gateway.ingest(request, &mut BodySource::new(body)).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod orchestrator;

pub use admission::{
    Admission, AdmissionController, AdmissionError, BodySource, ChunkSource, ReaderSource,
    DEFAULT_CEILING, DEFAULT_DRAIN_LIMIT,
};
pub use orchestrator::{
    Accepted, Gateway, IngestReport, IngestRequest, MessageState, Outcome, RejectReason,
};
