//! End-to-end message scenarios against in-memory backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use conduit_archive::{ArchiveOutcome, ArchiveWriter, MemoryArchiveBackend, SkipReason};
use conduit_authz::{AuthorizationGateway, AuthzResult, StaticAuthorizer, TenantPolicy};
use conduit_core::{
    Credential, DiagnosticLevel, MemoryDiagnostics, QueueId, Retention, StreamId, StreamMetadata,
    TenantId,
};
use conduit_gateway::{
    AdmissionController, Gateway, IngestReport, IngestRequest, MessageState, Outcome,
    ReaderSource, RejectReason, DEFAULT_CEILING,
};
use conduit_router::{MemoryQueueBackend, ProvisionCache, QueueRouter};
use http::StatusCode;

/// Counts authorize calls on the way through.
struct CountingAuthorizer {
    inner: StaticAuthorizer,
    calls: AtomicUsize,
}

#[async_trait]
impl AuthorizationGateway for CountingAuthorizer {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn authorize(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        credential: Option<&Credential>,
    ) -> AuthzResult<StreamMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authorize(tenant, stream, credential).await
    }
}

struct World {
    gateway: Gateway,
    authorizer: Arc<CountingAuthorizer>,
    queue: Arc<MemoryQueueBackend>,
    archive: Arc<MemoryArchiveBackend>,
    diagnostics: Arc<MemoryDiagnostics>,
}

fn tenant() -> TenantId {
    TenantId::new("T1").unwrap()
}

fn stream(name: &str) -> StreamId {
    StreamId::new(name).unwrap()
}

fn world() -> World {
    let policy = TenantPolicy::with_key("secret")
        .stream(stream("S1"), None)
        .stream(stream("S2"), Some(Retention::from_days(30).unwrap()))
        .stream(stream("S3"), Some(Retention::WEEK))
        .stream(stream("S4"), None);
    let authorizer = Arc::new(CountingAuthorizer {
        inner: StaticAuthorizer::default().with_tenant(tenant(), policy),
        calls: AtomicUsize::new(0),
    });
    let queue = Arc::new(MemoryQueueBackend::new());
    let archive = Arc::new(MemoryArchiveBackend::new());
    let diagnostics = Arc::new(MemoryDiagnostics::new());

    // S1..S3 already have queues; S4 is brand new.
    let router = QueueRouter::new(queue.clone(), diagnostics.clone())
        .with_cache(ProvisionCache::new(1024));
    for s in ["S1", "S2", "S3"] {
        queue.provision(&router.naming().queue_id(&tenant(), &stream(s)));
    }

    let gateway = Gateway::new(
        authorizer.clone(),
        router,
        ArchiveWriter::new(archive.clone(), diagnostics.clone()),
        diagnostics.clone(),
    )
    .with_admission(AdmissionController::new(DEFAULT_CEILING));

    World {
        gateway,
        authorizer,
        queue,
        archive,
        diagnostics,
    }
}

fn request(s: &str, content_type: &str) -> IngestRequest {
    IngestRequest::new(tenant(), stream(s))
        .with_credential(Credential::new("secret"))
        .with_content_type(content_type)
}

async fn send(world: &World, request: IngestRequest, body: &[u8]) -> IngestReport {
    world
        .gateway
        .ingest(request, &mut ReaderSource::new(body))
        .await
}

fn queue_of(world: &World, s: &str) -> QueueId {
    world.gateway.router().naming().queue_id(&tenant(), &stream(s))
}

#[tokio::test]
async fn test_json_without_retention_is_enqueued_only() {
    let w = world();
    let report = send(&w, request("S1", "application/json"), b"{\"n\":12345}").await;

    assert_eq!(report.outcome(), Outcome::Accepted);
    assert!(report.visited(MessageState::Enqueued));
    assert!(report.visited(MessageState::ArchiveSkipped));
    assert_eq!(
        report.result.as_ref().unwrap().archive,
        ArchiveOutcome::Skipped(SkipReason::NoRetention)
    );
    assert_eq!(w.queue.messages(&queue_of(&w, "S1")).len(), 1);
    assert_eq!(w.archive.put_calls(), 0);
    assert!(w.diagnostics.entries().is_empty());
}

#[tokio::test]
async fn test_json_with_retention_is_enqueued_and_archived() {
    let w = world();
    let report = send(&w, request("S2", "application/json"), b"{\"n\":12345}").await;

    assert_eq!(report.outcome(), Outcome::Accepted);
    assert_eq!(
        report.trail,
        vec![
            MessageState::Received,
            MessageState::Authorized,
            MessageState::Admitted,
            MessageState::Enqueued,
            MessageState::Archived,
            MessageState::Completed,
        ]
    );
    let records = w.archive.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].retention.days(), 30);
    assert_eq!(records[0].stream, stream("S2"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected_without_side_effects() {
    let w = world();
    let body = vec![b'a'; DEFAULT_CEILING + 1];
    let report = send(&w, request("S2", "application/json"), &body).await;

    assert_eq!(report.outcome(), Outcome::PayloadTooLarge);
    assert_eq!(report.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        report.final_state(),
        Some(MessageState::Rejected(RejectReason::PayloadTooLarge))
    );
    assert!(report.body_drained);
    assert_eq!(w.queue.stats().submit_calls, 0);
    assert_eq!(w.archive.put_calls(), 0);
}

#[tokio::test]
async fn test_oversized_body_without_media_type_leaves_no_diagnostics() {
    let w = world();
    let req = IngestRequest::new(tenant(), stream("S1")).with_credential(Credential::new("secret"));
    let body = vec![b'a'; DEFAULT_CEILING + 1];
    let report = send(&w, req, &body).await;

    assert_eq!(report.outcome(), Outcome::PayloadTooLarge);
    assert_eq!(report.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(w.diagnostics.entries().is_empty());
    assert_eq!(w.queue.stats().submit_calls, 0);
}

#[tokio::test]
async fn test_body_at_ceiling_is_accepted() {
    let w = world();
    let body = vec![b'a'; DEFAULT_CEILING];
    let report = send(&w, request("S1", "application/octet-stream"), &body).await;

    assert_eq!(report.outcome(), Outcome::Accepted);
    let stored = w.queue.messages(&queue_of(&w, "S1"));
    assert_eq!(stored[0].payload().unwrap().len(), DEFAULT_CEILING);
}

#[tokio::test]
async fn test_text_with_retention_skips_archive_with_one_warning() {
    let w = world();
    let report = send(&w, request("S3", "text/plain"), b"hello world").await;

    assert_eq!(report.outcome(), Outcome::Accepted);
    assert_eq!(report.status_code(), StatusCode::NO_CONTENT);
    assert!(report.visited(MessageState::ArchiveSkipped));
    assert_eq!(w.archive.put_calls(), 0);

    let warnings = w.diagnostics.at_level(DiagnosticLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].tenant, tenant());
    assert!(warnings[0].message.contains("S3"));
}

#[tokio::test]
async fn test_first_message_provisions_queue_once() {
    let w = world();
    let queue = queue_of(&w, "S4");
    assert!(!w.queue.exists(&queue));

    let first = send(&w, request("S4", "application/json"), b"{}").await;
    assert_eq!(first.outcome(), Outcome::Accepted);
    assert!(first.result.as_ref().unwrap().created_queue);
    assert_eq!(w.queue.stats().create_calls, 1);
    assert_eq!(w.queue.stats().submitted, 1);

    let second = send(&w, request("S4", "application/json"), b"{}").await;
    assert_eq!(second.outcome(), Outcome::Accepted);
    assert!(!second.result.as_ref().unwrap().created_queue);
    assert_eq!(w.queue.stats().create_calls, 1);
    assert_eq!(w.queue.messages(&queue).len(), 2);

    let info = w.diagnostics.at_level(DiagnosticLevel::Info);
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].message, "Created new queue S4");
}

#[tokio::test]
async fn test_invalid_credential_has_zero_side_effects() {
    let w = world();
    let req = request("S2", "application/json").with_credential(Credential::new("nope"));
    let report = send(&w, req, b"{\"n\":1}").await;

    assert_eq!(report.outcome(), Outcome::Unauthorized);
    assert_eq!(report.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(report.trail.len(), 2);
    assert_eq!(w.authorizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(w.queue.stats().submit_calls, 0);
    assert_eq!(w.queue.stats().create_calls, 0);
    assert_eq!(w.archive.put_calls(), 0);
    assert!(w.diagnostics.entries().is_empty());
}

#[tokio::test]
async fn test_rejection_reasons_are_indistinguishable() {
    let w = world();
    let unknown_tenant = IngestRequest::new(TenantId::new("T9").unwrap(), stream("S1"))
        .with_credential(Credential::new("secret"))
        .with_content_type("application/json");
    let unknown_stream = request("S99", "application/json");
    let missing_credential = IngestRequest::new(tenant(), stream("S1"));

    let mut envelopes = Vec::new();
    for req in [unknown_tenant, unknown_stream, missing_credential] {
        let report = send(&w, req, b"{}").await;
        assert_eq!(report.outcome(), Outcome::Unauthorized);
        let envelope = report.result.unwrap_err().to_envelope(None);
        envelopes.push(serde_json::to_string(&envelope).unwrap());
    }

    assert!(envelopes.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(w.queue.stats().submit_calls, 0);
}

#[tokio::test]
async fn test_authorization_happens_once_per_message() {
    let w = world();
    for _ in 0..3 {
        send(&w, request("S1", "application/json"), b"{}").await;
    }
    assert_eq!(w.authorizer.calls.load(Ordering::SeqCst), 3);
}
