//! Per-message orchestration.
//!
//! Each message moves through
//!
//! ```text
//! Received -> Authorized -> Admitted -> Enqueued -> Archived | ArchiveSkipped | ArchiveFailed -> Completed
//! ```
//!
//! and may stop early in `Rejected` after any of the first three. Enqueue
//! always happens before the archive write; once a message is enqueued the
//! request succeeds whatever the archive does.

use std::fmt;
use std::sync::Arc;

use conduit_archive::{ArchiveOutcome, ArchiveWriter, SkipReason};
use conduit_authz::AuthorizationGateway;
use conduit_core::{
    ContentKind, Credential, DiagnosticsSink, IngestError, IngestResult, Message, QueueId,
    RequestContext, RequestId, StreamId, TenantId,
};
use conduit_router::QueueRouter;
use conduit_telemetry::metrics as telemetry;
use http::StatusCode;
use tracing::Instrument;
use uuid::Uuid;

use crate::admission::{Admission, AdmissionController, ChunkSource};

/// Why a message was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Authorization refused the caller.
    Unauthorized,
    /// Authorization could not be reached.
    AuthorizationUnavailable,
    /// The body could not be read.
    UnreadableBody,
    /// The body exceeded the ceiling.
    PayloadTooLarge,
    /// The queue router gave up.
    QueueFailure,
}

/// A step in a message's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// The request arrived.
    Received,
    /// Authorization allowed it.
    Authorized,
    /// The body fit under the ceiling.
    Admitted,
    /// The message is on its queue.
    Enqueued,
    /// The message was written to the retention store.
    Archived,
    /// The archive policy did not apply.
    ArchiveSkipped,
    /// The archive write failed.
    ArchiveFailed,
    /// Processing finished.
    Completed,
    /// Processing stopped early.
    Rejected(RejectReason),
}

impl MessageState {
    /// Returns `true` for `Completed` and `Rejected`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected(_))
    }
}

/// Caller-visible outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The message was accepted.
    Accepted,
    /// The body exceeded the ceiling.
    PayloadTooLarge,
    /// Authorization refused the caller.
    Unauthorized,
    /// The request was malformed.
    BadRequest,
    /// A permanent infrastructure failure.
    ServerError,
}

impl Outcome {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad_request",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound message, minus its body.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Target tenant.
    pub tenant: TenantId,
    /// Target stream.
    pub stream: StreamId,
    /// Caller credential, if one was presented.
    pub credential: Option<Credential>,
    /// Raw content-type header value.
    pub content_type: Option<String>,
    /// Per-request context.
    pub context: RequestContext,
}

impl IngestRequest {
    /// Creates a request with no credential and no content type.
    #[must_use]
    pub fn new(tenant: TenantId, stream: StreamId) -> Self {
        Self {
            tenant,
            stream,
            credential: None,
            content_type: None,
            context: RequestContext::new(),
        }
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the request context.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Details of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// Id assigned to the message.
    pub message_id: Uuid,
    /// Queue the message landed on.
    pub queue: QueueId,
    /// Whether this message provisioned its queue.
    pub created_queue: bool,
    /// What the archive path did.
    pub archive: ArchiveOutcome,
}

/// Everything that happened to one message.
#[derive(Debug)]
pub struct IngestReport {
    /// Request the message arrived on.
    pub request_id: RequestId,
    /// States visited, in order.
    pub trail: Vec<MessageState>,
    /// Final result.
    pub result: IngestResult<Accepted>,
    /// Whether the body was read to its end. When `false` the connection
    /// cannot be reused.
    pub body_drained: bool,
}

impl IngestReport {
    /// Caller-visible outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match &self.result {
            Ok(_) => Outcome::Accepted,
            Err(IngestError::PayloadTooLarge { .. }) => Outcome::PayloadTooLarge,
            Err(IngestError::Unauthorized) => Outcome::Unauthorized,
            Err(IngestError::BadRequest { .. }) => Outcome::BadRequest,
            Err(IngestError::Infrastructure { .. } | IngestError::Internal { .. }) => {
                Outcome::ServerError
            }
        }
    }

    /// HTTP status for the outcome.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match &self.result {
            Ok(_) => StatusCode::NO_CONTENT,
            Err(err) => err.status_code(),
        }
    }

    /// Last state reached.
    #[must_use]
    pub fn final_state(&self) -> Option<MessageState> {
        self.trail.last().copied()
    }

    /// Returns `true` if the trail contains `state`.
    #[must_use]
    pub fn visited(&self, state: MessageState) -> bool {
        self.trail.contains(&state)
    }
}

/// Sequences authorization, admission, routing and archival for each message.
pub struct Gateway {
    authorizer: Arc<dyn AuthorizationGateway>,
    admission: AdmissionController,
    router: QueueRouter,
    archive: ArchiveWriter,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("authorizer", &self.authorizer.name())
            .field("admission", &self.admission)
            .field("router", &self.router)
            .field("archive", &self.archive)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway with the default admission ceiling.
    pub fn new(
        authorizer: Arc<dyn AuthorizationGateway>,
        router: QueueRouter,
        archive: ArchiveWriter,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            authorizer,
            admission: AdmissionController::default(),
            router,
            archive,
            diagnostics,
        }
    }

    /// Replaces the admission controller.
    #[must_use]
    pub fn with_admission(mut self, admission: AdmissionController) -> Self {
        self.admission = admission;
        self
    }

    /// The admission controller in use.
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// The queue router in use.
    pub fn router(&self) -> &QueueRouter {
        &self.router
    }

    /// The archive writer in use.
    pub fn archive(&self) -> &ArchiveWriter {
        &self.archive
    }

    /// Processes one message whose body is read from `body`.
    pub async fn ingest<S>(&self, request: IngestRequest, body: &mut S) -> IngestReport
    where
        S: ChunkSource + ?Sized,
    {
        let span = tracing::info_span!(
            "ingest",
            request_id = %request.context.request_id(),
            tenant = %request.tenant,
            stream = %request.stream,
        );
        let _in_flight = telemetry::InFlightGuard::new();

        let report = self.process(&request, body).instrument(span).await;

        let outcome = report.outcome();
        telemetry::record_message(outcome.as_str(), request.context.elapsed());
        report
    }

    async fn process<S>(&self, request: &IngestRequest, body: &mut S) -> IngestReport
    where
        S: ChunkSource + ?Sized,
    {
        let mut run = Run::new(request.context.request_id());
        let tenant = &request.tenant;
        let stream = &request.stream;

        let metadata = match self
            .authorizer
            .authorize(tenant, stream, request.credential.as_ref())
            .await
        {
            Ok(metadata) => metadata,
            Err(err) => {
                let reason = if err.is_rejection() {
                    tracing::warn!(reason = err.reason(), "authorization rejected");
                    RejectReason::Unauthorized
                } else {
                    tracing::error!(error = %err, "authorization unavailable");
                    RejectReason::AuthorizationUnavailable
                };
                run.body_drained = self.admission.discard(body).await.unwrap_or(false);
                return run.reject(reason, err.into_ingest_error());
            }
        };
        run.advance(MessageState::Authorized);

        let payload = match self.admission.admit(body).await {
            Ok(Admission::Admitted(payload)) => payload,
            Ok(Admission::TooLarge { drained }) => {
                run.body_drained = drained;
                tracing::warn!(ceiling = self.admission.ceiling(), "message exceeds ceiling");
                return run.reject(
                    RejectReason::PayloadTooLarge,
                    IngestError::payload_too_large(self.admission.ceiling()),
                );
            }
            Err(err) => {
                run.body_drained = false;
                tracing::warn!(error = %err, "message body unreadable");
                return run.reject(
                    RejectReason::UnreadableBody,
                    IngestError::bad_request("message body could not be read"),
                );
            }
        };
        run.body_drained = true;
        telemetry::record_message_bytes(payload.len());
        run.advance(MessageState::Admitted);

        let content_kind = match request.content_type.as_deref() {
            Some(value) => ContentKind::parse(value),
            None => {
                self.diagnostics.warn(
                    tenant,
                    &format!("Message for stream {stream} missing media type"),
                );
                ContentKind::default()
            }
        };

        let message = Message::for_request(&request.context, payload, content_kind);
        let submitted = match self.router.submit(tenant, stream, &message).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(queue = %err.queue(), error = %err, "enqueue failed");
                return run.reject(RejectReason::QueueFailure, err.into());
            }
        };
        if submitted.created_queue {
            telemetry::record_queue_created();
        }
        run.advance(MessageState::Enqueued);
        tracing::debug!(queue = %submitted.queue, message_id = %message.id, "message enqueued");

        let archive = self
            .archive
            .maybe_archive(tenant, stream, &message, &metadata)
            .await;
        telemetry::record_archive(archive.as_str());
        run.advance(match archive {
            ArchiveOutcome::Archived => MessageState::Archived,
            ArchiveOutcome::Skipped(_) => MessageState::ArchiveSkipped,
            ArchiveOutcome::Failed => MessageState::ArchiveFailed,
        });
        if let ArchiveOutcome::Skipped(SkipReason::UnsupportedContentKind) | ArchiveOutcome::Failed =
            archive
        {
            tracing::warn!(archive = archive.as_str(), "message not archived");
        }

        run.complete(Accepted {
            message_id: message.id,
            queue: submitted.queue,
            created_queue: submitted.created_queue,
            archive,
        })
    }
}

struct Run {
    request_id: RequestId,
    trail: Vec<MessageState>,
    body_drained: bool,
}

impl Run {
    fn new(request_id: RequestId) -> Self {
        tracing::debug!("message received");
        Self {
            request_id,
            trail: vec![MessageState::Received],
            body_drained: false,
        }
    }

    fn advance(&mut self, state: MessageState) {
        tracing::debug!(state = ?state, "message state");
        self.trail.push(state);
    }

    fn reject(mut self, reason: RejectReason, error: IngestError) -> IngestReport {
        self.trail.push(MessageState::Rejected(reason));
        IngestReport {
            request_id: self.request_id,
            trail: self.trail,
            result: Err(error),
            body_drained: self.body_drained,
        }
    }

    fn complete(mut self, accepted: Accepted) -> IngestReport {
        self.trail.push(MessageState::Completed);
        IngestReport {
            request_id: self.request_id,
            trail: self.trail,
            result: Ok(accepted),
            body_drained: self.body_drained,
        }
    }
}
