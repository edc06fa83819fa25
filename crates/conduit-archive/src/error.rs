//! Archive error types.

use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors building an archive record or writing it through an
/// [`ArchiveBackend`](crate::ArchiveBackend).
///
/// None of these ever fail an ingest request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArchiveError {
    /// The payload is not a JSON object and cannot be enriched.
    #[error("payload is not a JSON object: {0}")]
    InvalidRecord(String),

    /// Backend I/O failure.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refused or could not be reached.
    #[error("archive backend unavailable: {0}")]
    Unavailable(String),
}

impl ArchiveError {
    /// Check if the tenant's payload, not the backend, caused the failure.
    pub const fn is_tenant_fault(&self) -> bool {
        matches!(self, Self::InvalidRecord(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_fault() {
        assert!(ArchiveError::InvalidRecord("array".into()).is_tenant_fault());
        assert!(!ArchiveError::Unavailable("down".into()).is_tenant_fault());
        assert!(!ArchiveError::Io(std::io::Error::other("disk")).is_tenant_fault());
    }
}
