//! Known-provisioned queue cache.
//!
//! Remembers queues this process has seen exist. It is never authoritative:
//! a stale entry only costs one failed submit, after which the router evicts
//! it and provisions normally.

use std::sync::atomic::{AtomicU64, Ordering};

use conduit_core::QueueId;
use dashmap::DashMap;

/// Default maximum number of remembered queues.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionStats {
    /// Queues currently remembered.
    pub size: usize,
    /// Entries dropped because a submit proved them stale.
    pub stale_evictions: u64,
    /// Create calls skipped because another task provisioned first.
    pub skipped_creates: u64,
}

/// Concurrent set of queues known to exist.
#[derive(Debug)]
pub struct ProvisionCache {
    known: DashMap<QueueId, ()>,
    capacity: usize,
    stale_evictions: AtomicU64,
    skipped_creates: AtomicU64,
}

impl Default for ProvisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProvisionCache {
    /// Creates a cache remembering at most `capacity` queues.
    pub fn new(capacity: usize) -> Self {
        Self {
            known: DashMap::new(),
            capacity,
            stale_evictions: AtomicU64::new(0),
            skipped_creates: AtomicU64::new(0),
        }
    }

    /// Returns `true` if the queue is believed to exist.
    pub fn contains(&self, queue: &QueueId) -> bool {
        self.known.contains_key(queue)
    }

    /// Records that the queue exists.
    ///
    /// When full the cache is cleared rather than tracking recency; the cost
    /// of a miss is one extra create call.
    pub fn remember(&self, queue: &QueueId) {
        if self.capacity == 0 || self.known.contains_key(queue) {
            return;
        }
        if self.known.len() >= self.capacity {
            self.known.clear();
        }
        self.known.insert(queue.clone(), ());
    }

    /// Drops an entry a submit proved wrong.
    pub fn forget_stale(&self, queue: &QueueId) {
        if self.known.remove(queue).is_some() {
            self.stale_evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_skipped_create(&self) {
        self.skipped_creates.fetch_add(1, Ordering::Relaxed);
    }

    /// Get cache statistics.
    pub fn stats(&self) -> ProvisionStats {
        ProvisionStats {
            size: self.known.len(),
            stale_evictions: self.stale_evictions.load(Ordering::Relaxed),
            skipped_creates: self.skipped_creates.load(Ordering::Relaxed),
        }
    }
}
