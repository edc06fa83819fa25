//! # Conduit Core
//!
//! Core types shared by every Conduit crate:
//!
//! - [`TenantId`], [`StreamId`], [`QueueId`] - validated identifiers
//! - [`ContentKind`] - declared media type of a message
//! - [`Retention`] / [`StreamMetadata`] - what authorization says about a stream
//! - [`Message`] / [`RequestContext`] - per-request state
//! - [`DiagnosticsSink`] - tenant-visible, non-fatal diagnostics
//! - [`IngestError`] - caller-facing error taxonomy with HTTP mapping

#![doc(html_root_url = "https://docs.rs/conduit-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod content;
mod context;
pub mod diagnostics;
mod error;
mod ids;
mod stream;

pub use content::ContentKind;
pub use context::{Message, RequestContext, RequestId};
pub use diagnostics::{
    Diagnostic, DiagnosticLevel, DiagnosticsSink, MemoryDiagnostics, TracingDiagnostics,
};
pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, IngestError, IngestResult};
pub use ids::{IdError, QueueId, StreamId, TenantId, MAX_ID_LEN};
pub use stream::{Credential, Retention, RetentionError, StreamMetadata};
