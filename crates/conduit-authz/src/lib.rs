//! Conduit Authorization
//!
//! Resolves `(tenant, stream, credential)` to the stream's metadata, or a
//! rejection, in a single round trip. Fetching the decision and the retention
//! policy together keeps one lookup on the hot path and means the metadata
//! used for archival is the metadata that was authorized.
//!
//! # Implementations
//!
//! - [`StaticAuthorizer`] - tenant table from configuration
//! - [`RemoteAuthorizer`] - HTTP account service
//! - [`CachedAuthorizer`] - TTL cache in front of either
//!
//! # Rejections
//!
//! [`AuthzError`] distinguishes missing credential, bad credential, unknown
//! tenant and unknown stream for logging. [`AuthzError::into_ingest_error`]
//! collapses all of them to a single unauthorized outcome.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod remote;
pub mod table;

use async_trait::async_trait;
use conduit_core::{Credential, StreamId, StreamMetadata, TenantId};

pub use cache::{CacheConfig, CacheStats, CachedAuthorizer, DecisionCache};
pub use error::{AuthzError, AuthzResult};
pub use remote::{RemoteAuthorizer, RemoteConfig};
pub use table::{StaticAuthorizer, StreamPolicy, TenantPolicy};

/// Collaborator deciding whether a caller may write to a stream.
#[async_trait]
pub trait AuthorizationGateway: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Authorizes a write and returns the stream's metadata.
    ///
    /// A `None` credential is a rejection, never an anonymous allow.
    async fn authorize(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        credential: Option<&Credential>,
    ) -> AuthzResult<StreamMetadata>;
}
