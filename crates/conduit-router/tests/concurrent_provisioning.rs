//! Concurrent first submissions to a brand-new stream.

use std::sync::Arc;

use bytes::Bytes;
use conduit_core::{ContentKind, MemoryDiagnostics, Message, StreamId, TenantId};
use conduit_router::{
    MemoryQueueBackend, ProvisionCache, QueueBackend, QueueRouter, SpoolQueueBackend,
};

const RACERS: usize = 32;

fn ids() -> (TenantId, StreamId) {
    (
        TenantId::new("t1").unwrap(),
        StreamId::new("fresh_stream").unwrap(),
    )
}

async fn race(router: Arc<QueueRouter>) -> usize {
    let (tenant, stream) = ids();
    let mut handles = Vec::with_capacity(RACERS);
    for i in 0..RACERS {
        let router = router.clone();
        let tenant = tenant.clone();
        let stream = stream.clone();
        handles.push(tokio::spawn(async move {
            let body = format!(r#"{{"i":{i}}}"#);
            let message = Message::new(Bytes::from(body), ContentKind::Json);
            router.submit(&tenant, &stream, &message).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        if report.created_queue {
            created += 1;
        }
    }
    created
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_memory_backend_single_logical_creation() {
    for cached in [false, true] {
        let backend = Arc::new(MemoryQueueBackend::new());
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let mut router = QueueRouter::new(backend.clone(), diagnostics.clone());
        if cached {
            router = router.with_cache(ProvisionCache::default());
        }

        let created = race(Arc::new(router)).await;

        let stats = backend.stats();
        assert_eq!(stats.created, 1, "exactly one create takes effect");
        assert_eq!(created, 1, "exactly one caller reports creating the queue");
        assert_eq!(stats.already_existed, stats.create_calls - 1);
        assert_eq!(backend.total_messages(), RACERS);
        assert_eq!(diagnostics.entries().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_spool_backend_single_logical_creation() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(SpoolQueueBackend::open(dir.path()).await.unwrap());
    let router = QueueRouter::new(backend.clone(), Arc::new(MemoryDiagnostics::new()))
        .with_cache(ProvisionCache::default());

    let router = Arc::new(router);
    let created = race(router.clone()).await;
    assert_eq!(created, 1);

    let (tenant, stream) = ids();
    let queue = router.naming().queue_id(&tenant, &stream);
    assert_eq!(backend.pending(&queue).await.unwrap().len(), RACERS);

    // A follow-up create is a no-op.
    assert_eq!(
        backend.create(&queue).await.unwrap(),
        conduit_router::Provisioned::AlreadyExisted
    );
}
