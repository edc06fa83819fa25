//! In-memory archive backend.
//!
//! Holds at most [`MemoryArchiveBackend::capacity`] records, dropping the
//! oldest when full.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ArchiveError, ArchiveResult};
use crate::record::ArchiveRecord;
use crate::ArchiveBackend;

/// Records kept by default before the oldest is dropped.
pub const DEFAULT_ARCHIVE_CAPACITY: usize = 10_000;

/// Archive backend keeping records in process memory.
#[derive(Debug)]
pub struct MemoryArchiveBackend {
    records: Mutex<VecDeque<ArchiveRecord>>,
    capacity: usize,
    put_calls: AtomicU64,
    dropped: AtomicU64,
    fail: AtomicBool,
}

impl Default for MemoryArchiveBackend {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ARCHIVE_CAPACITY)
    }
}

impl MemoryArchiveBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend holding at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            put_calls: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Record limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records stored so far, oldest first.
    pub fn records(&self) -> Vec<ArchiveRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Removes and returns up to `max` of the oldest records.
    pub fn drain(&self, max: usize) -> Vec<ArchiveRecord> {
        let mut records = self.records.lock();
        let n = max.min(records.len());
        records.drain(..n).collect()
    }

    /// Number of `put` calls, successful or not.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Records evicted to stay within capacity.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Makes every put fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArchiveBackend for MemoryArchiveBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, record: &ArchiveRecord) -> ArchiveResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArchiveError::Unavailable("injected archive failure".to_string()));
        }
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
        records.push_back(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use conduit_core::{ContentKind, Message, Retention, StreamId, TenantId};

    fn record(n: u32) -> ArchiveRecord {
        let payload = Bytes::from(format!(r#"{{"n":{n}}}"#));
        ArchiveRecord::new(
            &TenantId::new("acme").unwrap(),
            &StreamId::new("clicks").unwrap(),
            &Message::new(payload, ContentKind::Json),
            Retention::DAY,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let archive = MemoryArchiveBackend::with_capacity(2);
        let records: Vec<_> = (0..3).map(record).collect();
        for r in &records {
            archive.put(r).await.unwrap();
        }

        assert_eq!(archive.records(), records[1..].to_vec());
        assert_eq!(archive.dropped(), 1);
        assert_eq!(archive.put_calls(), 3);
    }

    #[tokio::test]
    async fn test_drain_returns_oldest_first() {
        let archive = MemoryArchiveBackend::new();
        let first = record(1);
        let second = record(2);
        archive.put(&first).await.unwrap();
        archive.put(&second).await.unwrap();

        assert_eq!(archive.drain(1), vec![first]);
        assert_eq!(archive.drain(5), vec![second]);
        assert!(archive.records().is_empty());
    }
}
