//! Queue and router error types.

use conduit_core::{IngestError, QueueId};
use thiserror::Error;

/// Result type for queue backend operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors reported by a [`QueueBackend`](crate::QueueBackend).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The queue has not been provisioned.
    #[error("queue {queue} does not exist")]
    NotFound {
        /// Queue that was addressed.
        queue: QueueId,
    },

    /// The message was refused by the backend.
    #[error("queue {queue} rejected message: {message}")]
    Rejected {
        /// Queue that was addressed.
        queue: QueueId,
        /// Backend explanation.
        message: String,
    },

    /// Backend I/O failure.
    #[error("queue backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message envelope could not be serialized.
    #[error("failed to encode queue message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl QueueError {
    /// Create a not-found error.
    pub fn not_found(queue: &QueueId) -> Self {
        Self::NotFound {
            queue: queue.clone(),
        }
    }

    /// Check if the queue is missing, the one condition the router heals.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Permanent routing failures surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Creating the queue failed.
    #[error("failed to provision queue {queue}")]
    Provision {
        /// Queue being provisioned.
        queue: QueueId,
        /// Backend failure.
        #[source]
        source: QueueError,
    },

    /// The queue was still missing after provisioning and one retry.
    #[error("queue {queue} still missing after provisioning")]
    StillMissing {
        /// Queue being submitted to.
        queue: QueueId,
    },

    /// Submission failed for a reason other than a missing queue.
    #[error("failed to submit to queue {queue}")]
    Submit {
        /// Queue being submitted to.
        queue: QueueId,
        /// Backend failure.
        #[source]
        source: QueueError,
    },
}

impl RouterError {
    /// Queue the failure concerns.
    pub const fn queue(&self) -> &QueueId {
        match self {
            Self::Provision { queue, .. }
            | Self::StillMissing { queue }
            | Self::Submit { queue, .. } => queue,
        }
    }
}

impl From<RouterError> for IngestError {
    fn from(err: RouterError) -> Self {
        IngestError::infrastructure_with_source("message could not be enqueued", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        let queue = QueueId::from_name("customer-t1-s1");
        assert!(QueueError::not_found(&queue).is_not_found());
        assert!(!QueueError::Io(std::io::Error::other("disk full")).is_not_found());
    }

    #[test]
    fn test_router_error_maps_to_infrastructure() {
        let err = RouterError::StillMissing {
            queue: QueueId::from_name("customer-t1-s1"),
        };
        assert_eq!(err.queue().as_str(), "customer-t1-s1");

        let ingest: IngestError = err.into();
        assert_eq!(ingest.status_code().as_u16(), 503);
    }
}
