//! Archive policy.
//!
//! A message is written to the retention store only when its stream has a
//! retention policy and its content kind is JSON. A stream with retention
//! receiving another kind gets one tenant-visible warning per message. Backend
//! failures also become a single warning; the caller never sees them.

use std::sync::Arc;

use conduit_core::{DiagnosticsSink, Message, StreamId, StreamMetadata, TenantId};

use crate::record::ArchiveRecord;
use crate::ArchiveBackend;

/// Why a message was not archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The stream has no retention policy.
    NoRetention,
    /// The stream has retention but the message is not JSON.
    UnsupportedContentKind,
    /// No archive backend is configured.
    Disabled,
}

/// What happened on the archive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The record was stored.
    Archived,
    /// Archival did not apply.
    Skipped(SkipReason),
    /// The backend write failed; a diagnostic was emitted.
    Failed,
}

impl ArchiveOutcome {
    /// Label for logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Archived => "archived",
            Self::Skipped(SkipReason::NoRetention) => "no_retention",
            Self::Skipped(SkipReason::UnsupportedContentKind) => "unsupported_content_kind",
            Self::Skipped(SkipReason::Disabled) => "disabled",
            Self::Failed => "failed",
        }
    }
}

/// Applies the archive policy and writes through an [`ArchiveBackend`].
pub struct ArchiveWriter {
    backend: Option<Arc<dyn ArchiveBackend>>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl ArchiveWriter {
    /// Creates a writer over `backend`.
    pub fn new(backend: Arc<dyn ArchiveBackend>, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            backend: Some(backend),
            diagnostics,
        }
    }

    /// Creates a writer that never archives.
    pub fn disabled(diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            backend: None,
            diagnostics,
        }
    }

    /// Returns `true` if a backend is configured.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Archives `message` if policy allows.
    pub async fn maybe_archive(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        message: &Message,
        metadata: &StreamMetadata,
    ) -> ArchiveOutcome {
        let Some(retention) = metadata.retention else {
            return ArchiveOutcome::Skipped(SkipReason::NoRetention);
        };

        if !message.content_kind.is_structured() {
            self.diagnostics.warn(
                tenant,
                &format!(
                    "Message for stream {stream} is {}, archiving requires application/json; skipping archive",
                    message.content_kind
                ),
            );
            return ArchiveOutcome::Skipped(SkipReason::UnsupportedContentKind);
        }

        let Some(backend) = &self.backend else {
            tracing::debug!(tenant = %tenant, stream = %stream, "archive disabled, skipping");
            return ArchiveOutcome::Skipped(SkipReason::Disabled);
        };

        let record = match ArchiveRecord::new(tenant, stream, message, retention) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(tenant = %tenant, stream = %stream, error = %err, "archive record rejected");
                self.diagnostics.warn(
                    tenant,
                    &format!(
                        "Failed to parse message for stream {stream} as a JSON object; skipping archive"
                    ),
                );
                return ArchiveOutcome::Failed;
            }
        };

        match backend.put(&record).await {
            Ok(()) => ArchiveOutcome::Archived,
            Err(err) => {
                tracing::warn!(
                    tenant = %tenant,
                    stream = %stream,
                    backend = backend.name(),
                    error = %err,
                    "archive write failed"
                );
                self.diagnostics.warn(
                    tenant,
                    &format!(
                        "Message for stream {stream} was delivered but could not be archived"
                    ),
                );
                ArchiveOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FsArchiveBackend, MemoryArchiveBackend};
    use bytes::Bytes;
    use conduit_core::{ContentKind, MemoryDiagnostics, Retention};

    struct Fixture {
        backend: Arc<MemoryArchiveBackend>,
        diagnostics: Arc<MemoryDiagnostics>,
        writer: ArchiveWriter,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryArchiveBackend::new());
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let writer = ArchiveWriter::new(backend.clone(), diagnostics.clone());
        Fixture {
            backend,
            diagnostics,
            writer,
        }
    }

    fn ids() -> (TenantId, StreamId) {
        (TenantId::new("t1").unwrap(), StreamId::new("s1").unwrap())
    }

    fn message(kind: ContentKind) -> Message {
        Message::new(Bytes::from_static(br#"{"n":1}"#), kind)
    }

    #[tokio::test]
    async fn test_policy_matrix() {
        let kinds = [
            ContentKind::Json,
            ContentKind::Text,
            ContentKind::OctetStream,
            ContentKind::parse("application/xml"),
        ];
        let metadatas = [
            StreamMetadata::without_retention(),
            StreamMetadata::with_retention(Retention::from_days(30).unwrap()),
        ];
        let (t, s) = ids();

        for kind in &kinds {
            for metadata in &metadatas {
                let f = fixture();
                let outcome = f
                    .writer
                    .maybe_archive(&t, &s, &message(kind.clone()), metadata)
                    .await;

                let should_write = kind.is_structured() && metadata.retention.is_some();
                assert_eq!(f.backend.put_calls() == 1, should_write, "{kind} {metadata:?}");
                assert_eq!(outcome == ArchiveOutcome::Archived, should_write);

                let expected_warnings = usize::from(metadata.retention.is_some() && !should_write);
                assert_eq!(f.diagnostics.warning_count(), expected_warnings);
            }
        }
    }

    #[tokio::test]
    async fn test_archived_record_contents() {
        let f = fixture();
        let (t, s) = ids();
        let msg = message(ContentKind::Json);

        f.writer
            .maybe_archive(&t, &s, &msg, &StreamMetadata::with_retention(Retention::WEEK))
            .await;

        let records = f.backend.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_id, msg.id);
        assert_eq!(records[0].retention, Retention::WEEK);
        let stored: serde_json::Value = serde_json::from_slice(&records[0].body).unwrap();
        assert_eq!(stored["n"], 1);
        assert_eq!(stored["_conduit_tenant"], "t1");
    }

    #[tokio::test]
    async fn test_non_object_json_fails_alike_on_every_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backends: [Arc<dyn ArchiveBackend>; 2] = [
            Arc::new(MemoryArchiveBackend::new()),
            Arc::new(FsArchiveBackend::open(dir.path()).await.unwrap()),
        ];
        let (t, s) = ids();
        let msg = Message::new(Bytes::from_static(b"[1,2,3]"), ContentKind::Json);

        for backend in backends {
            let diagnostics = Arc::new(MemoryDiagnostics::new());
            let writer = ArchiveWriter::new(backend.clone(), diagnostics.clone());

            let outcome = writer
                .maybe_archive(&t, &s, &msg, &StreamMetadata::with_retention(Retention::WEEK))
                .await;

            assert_eq!(outcome, ArchiveOutcome::Failed, "{}", backend.name());
            assert_eq!(diagnostics.warning_count(), 1, "{}", backend.name());
            assert!(diagnostics.entries()[0].message.contains("JSON object"));
        }
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_one_diagnostic() {
        let f = fixture();
        f.backend.set_fail(true);
        let (t, s) = ids();

        let outcome = f
            .writer
            .maybe_archive(
                &t,
                &s,
                &message(ContentKind::Json),
                &StreamMetadata::with_retention(Retention::DAY),
            )
            .await;

        assert_eq!(outcome, ArchiveOutcome::Failed);
        assert_eq!(f.diagnostics.warning_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_writer_skips_silently() {
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let writer = ArchiveWriter::disabled(diagnostics.clone());
        let (t, s) = ids();

        let outcome = writer
            .maybe_archive(
                &t,
                &s,
                &message(ContentKind::Json),
                &StreamMetadata::with_retention(Retention::DAY),
            )
            .await;

        assert_eq!(outcome, ArchiveOutcome::Skipped(SkipReason::Disabled));
        assert!(diagnostics.entries().is_empty());
        assert!(!writer.is_enabled());
    }
}
