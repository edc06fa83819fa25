//! Filesystem spool queue backend.
//!
//! Each queue is a directory under the spool root; each message is one JSON
//! file named by its UUID v7 message id, so a directory listing sorted by name
//! is arrival order. Files are written to a temporary name and renamed into
//! place so consumers never observe a partial message.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conduit_core::QueueId;

use crate::envelope::QueueMessage;
use crate::error::{QueueError, QueueResult};
use crate::{Provisioned, QueueBackend};

/// Queue backend writing messages to a spool directory.
#[derive(Debug, Clone)]
pub struct SpoolQueueBackend {
    root: PathBuf,
}

impl SpoolQueueBackend {
    /// Opens a spool rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> QueueResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Spool root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn queue_dir(&self, queue: &QueueId) -> QueueResult<PathBuf> {
        let name = queue.as_str();
        let safe = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(QueueError::Rejected {
                queue: queue.clone(),
                message: "queue name is not a safe directory name".to_string(),
            });
        }
        Ok(self.root.join(name))
    }

    /// Reads every message currently spooled on a queue, oldest first.
    pub async fn pending(&self, queue: &QueueId) -> QueueResult<Vec<QueueMessage>> {
        let dir = self.queue_dir(queue)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(QueueError::not_found(queue)),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut messages = Vec::with_capacity(files.len());
        for path in files {
            let raw = tokio::fs::read(&path).await?;
            messages.push(serde_json::from_slice(&raw)?);
        }
        Ok(messages)
    }
}

#[async_trait]
impl QueueBackend for SpoolQueueBackend {
    fn name(&self) -> &'static str {
        "spool"
    }

    async fn submit(&self, queue: &QueueId, message: &QueueMessage) -> QueueResult<()> {
        let dir = self.queue_dir(queue)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(QueueError::Rejected {
                    queue: queue.clone(),
                    message: "queue path is not a directory".to_string(),
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(QueueError::not_found(queue)),
            Err(e) => return Err(e.into()),
        }

        let body = serde_json::to_vec(message)?;
        let tmp = dir.join(format!(".{}.tmp", message.message_id));
        let dest = dir.join(format!("{}.json", message.message_id));

        let written = async {
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, &dest).await
        }
        .await;

        match written {
            Ok(()) => Ok(()),
            // Directory removed between the existence check and the write.
            Err(e) if e.kind() == ErrorKind::NotFound => Err(QueueError::not_found(queue)),
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e.into())
            }
        }
    }

    async fn create(&self, queue: &QueueId) -> QueueResult<Provisioned> {
        let dir = self.queue_dir(queue)?;
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => Ok(Provisioned::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Provisioned::AlreadyExisted),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use conduit_core::{ContentKind, Message, StreamId, TenantId};

    fn message(body: &'static [u8]) -> QueueMessage {
        QueueMessage::encode(
            &TenantId::new("t1").unwrap(),
            &StreamId::new("s1").unwrap(),
            &Message::new(Bytes::from_static(body), ContentKind::Json),
        )
    }

    #[tokio::test]
    async fn test_submit_before_create_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolQueueBackend::open(dir.path()).await.unwrap();
        let queue = QueueId::from_name("customer-t1-s1");

        let err = spool.submit(&queue, &message(b"{}")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_then_submit() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolQueueBackend::open(dir.path()).await.unwrap();
        let queue = QueueId::from_name("customer-t1-s1");

        assert_eq!(spool.create(&queue).await.unwrap(), Provisioned::Created);
        assert_eq!(
            spool.create(&queue).await.unwrap(),
            Provisioned::AlreadyExisted
        );

        let first = message(br#"{"n":1}"#);
        let second = message(br#"{"n":2}"#);
        spool.submit(&queue, &first).await.unwrap();
        spool.submit(&queue, &second).await.unwrap();

        assert_eq!(spool.pending(&queue).await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_unsafe_queue_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolQueueBackend::open(dir.path()).await.unwrap();

        let err = spool
            .create(&QueueId::from_name("../escape"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_pending_on_missing_queue() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolQueueBackend::open(dir.path().join("nested")).await.unwrap();

        assert!(spool.root().exists());
        let err = spool
            .pending(&QueueId::from_name("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
