//! Request and message context types.

use crate::content::ContentKind;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request context threaded through every ingest stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    received_at: SystemTime,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context for a request arriving now.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with the given request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            received_at: SystemTime::now(),
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Wall-clock arrival time, used for archive partitioning.
    #[must_use]
    pub const fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Time spent on this request so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An admitted message on its way to the queue and archive.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone)]
pub struct Message {
    /// Identifier assigned at admission (UUID v7).
    pub id: Uuid,
    /// Raw body bytes, at most the admission ceiling.
    pub payload: Bytes,
    /// Declared content kind.
    pub content_kind: ContentKind,
    /// Arrival instant.
    pub received_at: SystemTime,
}

impl Message {
    /// Creates a message with a fresh id, arriving now.
    #[must_use]
    pub fn new(payload: Bytes, content_kind: ContentKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            payload,
            content_kind,
            received_at: SystemTime::now(),
        }
    }

    /// Creates a message stamped with the request's arrival time.
    #[must_use]
    pub fn for_request(ctx: &RequestContext, payload: Bytes, content_kind: ContentKind) -> Self {
        Self {
            received_at: ctx.received_at(),
            ..Self::new(payload, content_kind)
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
