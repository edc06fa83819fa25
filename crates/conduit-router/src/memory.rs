//! In-memory queue backend.
//!
//! Used by the `memory` backend setting and as a recording test double. Fault
//! switches let tests drive the router's error paths deterministically.
//!
//! Each queue holds at most [`MemoryQueueBackend::capacity`] messages. A full
//! queue drops its oldest message to make room, and [`MemoryQueueBackend::drain`]
//! hands messages to an in-process consumer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use conduit_core::QueueId;
use parking_lot::Mutex;

use crate::envelope::QueueMessage;
use crate::error::{QueueError, QueueResult};
use crate::{Provisioned, QueueBackend};

/// Call counters observed by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Submit calls, successful or not.
    pub submit_calls: u64,
    /// Submit calls that stored a message.
    pub submitted: u64,
    /// Create calls, successful or not.
    pub create_calls: u64,
    /// Create calls that actually created a queue.
    pub created: u64,
    /// Create calls that found the queue already there.
    pub already_existed: u64,
    /// Messages evicted from a full queue.
    pub dropped: u64,
}

/// Messages a queue holds by default before dropping the oldest.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Queue backend holding messages in process memory.
#[derive(Debug)]
pub struct MemoryQueueBackend {
    queues: Mutex<HashMap<QueueId, VecDeque<QueueMessage>>>,
    capacity: usize,
    dropped: AtomicU64,
    submit_calls: AtomicU64,
    submitted: AtomicU64,
    create_calls: AtomicU64,
    created: AtomicU64,
    already_existed: AtomicU64,
    fail_create: AtomicBool,
    fail_submit: AtomicBool,
    invisible_after_create: AtomicBool,
}

impl Default for MemoryQueueBackend {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl MemoryQueueBackend {
    /// Creates an empty backend with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend whose queues hold at most `capacity`
    /// messages each. A zero capacity is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            submit_calls: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            create_calls: AtomicU64::new(0),
            created: AtomicU64::new(0),
            already_existed: AtomicU64::new(0),
            fail_create: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            invisible_after_create: AtomicBool::new(false),
        }
    }

    /// Per-queue message limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Provisions a queue without counting it as a create call.
    pub fn provision(&self, queue: &QueueId) {
        self.queues.lock().entry(queue.clone()).or_default();
    }

    /// Deletes a queue and its messages, as an operator might out of band.
    pub fn delete(&self, queue: &QueueId) {
        self.queues.lock().remove(queue);
    }

    /// Returns `true` if the queue exists.
    pub fn exists(&self, queue: &QueueId) -> bool {
        self.queues.lock().contains_key(queue)
    }

    /// Messages stored on a queue, in submission order.
    pub fn messages(&self, queue: &QueueId) -> Vec<QueueMessage> {
        self.queues
            .lock()
            .get(queue)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes and returns up to `max` messages from the front of a queue.
    pub fn drain(&self, queue: &QueueId, max: usize) -> Vec<QueueMessage> {
        let mut queues = self.queues.lock();
        let Some(messages) = queues.get_mut(queue) else {
            return Vec::new();
        };
        let n = max.min(messages.len());
        messages.drain(..n).collect()
    }

    /// Total messages stored across all queues.
    pub fn total_messages(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    /// Makes every create call fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Makes every submit call fail with an I/O error.
    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// Makes create report success without the queue becoming visible,
    /// mimicking a backend whose provisioning has not propagated yet.
    pub fn set_invisible_after_create(&self, invisible: bool) {
        self.invisible_after_create.store(invisible, Ordering::SeqCst);
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submit_calls: self.submit_calls.load(Ordering::SeqCst),
            submitted: self.submitted.load(Ordering::SeqCst),
            create_calls: self.create_calls.load(Ordering::SeqCst),
            created: self.created.load(Ordering::SeqCst),
            already_existed: self.already_existed.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn submit(&self, queue: &QueueId, message: &QueueMessage) -> QueueResult<()> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(QueueError::Io(std::io::Error::other("injected submit failure")));
        }

        let mut queues = self.queues.lock();
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::not_found(queue))?;
        if messages.len() >= self.capacity {
            messages.pop_front();
            self.dropped.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(queue = %queue, capacity = self.capacity, "memory queue full, dropped oldest message");
        }
        messages.push_back(message.clone());
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create(&self, queue: &QueueId) -> QueueResult<Provisioned> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(QueueError::Rejected {
                queue: queue.clone(),
                message: "injected create failure".to_string(),
            });
        }
        if self.invisible_after_create.load(Ordering::SeqCst) {
            self.created.fetch_add(1, Ordering::SeqCst);
            return Ok(Provisioned::Created);
        }

        let mut queues = self.queues.lock();
        if queues.contains_key(queue) {
            self.already_existed.fetch_add(1, Ordering::SeqCst);
            Ok(Provisioned::AlreadyExisted)
        } else {
            queues.insert(queue.clone(), VecDeque::new());
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Provisioned::Created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use conduit_core::{ContentKind, Message, StreamId, TenantId};

    fn message() -> QueueMessage {
        QueueMessage::encode(
            &TenantId::new("t1").unwrap(),
            &StreamId::new("s1").unwrap(),
            &Message::new(Bytes::from_static(b"x"), ContentKind::Text),
        )
    }

    #[tokio::test]
    async fn test_submit_to_missing_queue() {
        let backend = MemoryQueueBackend::new();
        let queue = QueueId::from_name("q");

        let err = backend.submit(&queue, &message()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let backend = MemoryQueueBackend::new();
        let queue = QueueId::from_name("q");

        assert_eq!(backend.create(&queue).await.unwrap(), Provisioned::Created);
        assert_eq!(
            backend.create(&queue).await.unwrap(),
            Provisioned::AlreadyExisted
        );

        let stats = backend.stats();
        assert_eq!(stats.create_calls, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.already_existed, 1);
    }

    #[tokio::test]
    async fn test_messages_in_order() {
        let backend = MemoryQueueBackend::new();
        let queue = QueueId::from_name("q");
        backend.provision(&queue);

        let first = message();
        let second = message();
        backend.submit(&queue, &first).await.unwrap();
        backend.submit(&queue, &second).await.unwrap();

        let stored = backend.messages(&queue);
        assert_eq!(stored, vec![first, second]);
        assert_eq!(backend.total_messages(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest() {
        let backend = MemoryQueueBackend::with_capacity(2);
        let queue = QueueId::from_name("q");
        backend.provision(&queue);

        let sent: Vec<_> = (0..3).map(|_| message()).collect();
        for m in &sent {
            backend.submit(&queue, m).await.unwrap();
        }

        assert_eq!(backend.messages(&queue), sent[1..].to_vec());
        assert_eq!(backend.stats().dropped, 1);
        assert_eq!(backend.stats().submitted, 3);
    }

    #[tokio::test]
    async fn test_drain_pops_from_front() {
        let backend = MemoryQueueBackend::new();
        let queue = QueueId::from_name("q");
        backend.provision(&queue);

        let first = message();
        let second = message();
        backend.submit(&queue, &first).await.unwrap();
        backend.submit(&queue, &second).await.unwrap();

        assert_eq!(backend.drain(&queue, 1), vec![first]);
        assert_eq!(backend.drain(&queue, 10), vec![second]);
        assert!(backend.drain(&queue, 10).is_empty());
        assert!(backend.exists(&queue));
        assert!(backend.drain(&QueueId::from_name("missing"), 1).is_empty());
    }
}
