//! Conduit Archive
//!
//! Secondary, best-effort durability. After a message is on its queue, the
//! [`ArchiveWriter`] decides whether it also goes to the retention store used
//! for batch analysis, and writes it through an [`ArchiveBackend`].
//!
//! Nothing on this path can fail a request: policy mismatches and backend
//! errors are reported to the tenant through the diagnostics channel.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fs;
pub mod memory;
pub mod record;
pub mod writer;

use async_trait::async_trait;

pub use error::{ArchiveError, ArchiveResult};
pub use fs::FsArchiveBackend;
pub use memory::{MemoryArchiveBackend, DEFAULT_ARCHIVE_CAPACITY};
pub use record::ArchiveRecord;
pub use writer::{ArchiveOutcome, ArchiveWriter, SkipReason};

/// Retention store accepting archive records.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Stores one record.
    ///
    /// Records arrive already enriched; a backend stores
    /// [`ArchiveRecord::body`] as is.
    async fn put(&self, record: &ArchiveRecord) -> ArchiveResult<()>;
}
