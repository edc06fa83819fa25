//! Filesystem archive backend.
//!
//! Writes each enriched record as its own JSON file under the partition
//! layout described in [`crate::record`]. Expiry is left to whatever manages
//! the directory tree; the retention tier is the first path component so a
//! lifecycle rule per tier is enough.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ArchiveResult;
use crate::record::ArchiveRecord;
use crate::ArchiveBackend;

/// Archive backend rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsArchiveBackend {
    root: PathBuf,
}

impl FsArchiveBackend {
    /// Opens an archive rooted at `root`, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path a record is stored at.
    pub fn path_for(&self, record: &ArchiveRecord) -> PathBuf {
        self.root
            .join(record.partition_prefix())
            .join(format!("{}.json", record.message_id))
    }
}

#[async_trait]
impl ArchiveBackend for FsArchiveBackend {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn put(&self, record: &ArchiveRecord) -> ArchiveResult<()> {
        let body = &record.body;
        let path = self.path_for(record);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(path = %path.display(), bytes = body.len(), "archived record");
        Ok(())
    }
}
