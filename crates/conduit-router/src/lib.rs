//! Conduit Queue Router
//!
//! Maps each `(tenant, stream)` to exactly one logical queue and delivers
//! messages to it, provisioning the queue on first use.
//!
//! # Backend contract
//!
//! A [`QueueBackend`] must:
//!
//! - report a missing queue from `submit` as [`QueueError::NotFound`] and
//!   nothing else, since that is the only failure the router heals;
//! - make `create` idempotent: creating a queue that already exists succeeds
//!   with [`Provisioned::AlreadyExisted`] rather than failing on conflict.
//!
//! Any backend (and any test double) honoring those two rules is safe under
//! concurrent first submissions.
//!
//! # Backends
//!
//! - [`MemoryQueueBackend`] - bounded process memory, with fault injection
//! - [`SpoolQueueBackend`] - one directory per queue on local disk

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod naming;
pub mod router;
pub mod spool;

use async_trait::async_trait;
use conduit_core::QueueId;

pub use cache::{ProvisionCache, ProvisionStats};
pub use envelope::{Encoding, QueueMessage};
pub use error::{QueueError, QueueResult, RouterError};
pub use memory::{MemoryQueueBackend, QueueStats, DEFAULT_QUEUE_CAPACITY};
pub use naming::QueueNaming;
pub use router::{QueueRouter, SubmitReport};
pub use spool::SpoolQueueBackend;

/// Result of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// This call created the queue.
    Created,
    /// The queue was already there; nothing changed.
    AlreadyExisted,
}

/// Durable real-time delivery backend.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Appends a message to an existing queue.
    async fn submit(&self, queue: &QueueId, message: &QueueMessage) -> QueueResult<()>;

    /// Creates the queue if absent. Must succeed when it already exists.
    async fn create(&self, queue: &QueueId) -> QueueResult<Provisioned>;
}
