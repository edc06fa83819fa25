//! Error types for the authorization crate.

use conduit_core::{IngestError, StreamId, TenantId};
use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur during authorization.
///
/// The rejection variants carry enough detail for operator logs. Callers only
/// ever see [`IngestError::Unauthorized`]; see [`AuthzError::into_ingest_error`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// The request carried no credential.
    #[error("no credential presented for tenant {tenant}")]
    MissingCredential {
        /// Tenant the request addressed.
        tenant: TenantId,
    },

    /// The credential does not belong to the tenant.
    #[error("invalid credential for tenant {tenant}")]
    InvalidCredential {
        /// Tenant the request addressed.
        tenant: TenantId,
    },

    /// The tenant does not exist.
    #[error("unknown tenant {tenant}")]
    UnknownTenant {
        /// Tenant the request addressed.
        tenant: TenantId,
    },

    /// The stream does not exist for this tenant.
    #[error("unknown stream {stream} for tenant {tenant}")]
    UnknownStream {
        /// Tenant the request addressed.
        tenant: TenantId,
        /// Stream the request addressed.
        stream: StreamId,
    },

    /// The authorization backend could not be reached.
    #[error("authorization backend unavailable: {0}")]
    Unavailable(String),

    /// The authorization backend answered with something unexpected.
    #[error("authorization backend protocol error: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthzError {
    /// Create an unknown stream error.
    pub fn unknown_stream(tenant: &TenantId, stream: &StreamId) -> Self {
        Self::UnknownStream {
            tenant: tenant.clone(),
            stream: stream.clone(),
        }
    }

    /// Check if this is a decision against the caller rather than a failure
    /// to decide.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::InvalidCredential { .. }
                | Self::UnknownTenant { .. }
                | Self::UnknownStream { .. }
        )
    }

    /// Check if this is a retryable error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Short label for logs and metrics.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::InvalidCredential { .. } => "invalid_credential",
            Self::UnknownTenant { .. } => "unknown_tenant",
            Self::UnknownStream { .. } => "unknown_stream",
            Self::Unavailable(_) => "unavailable",
            Self::Protocol(_) => "protocol",
            Self::Config(_) => "config",
        }
    }

    /// Collapses this error into the caller-facing taxonomy.
    ///
    /// Every rejection becomes [`IngestError::Unauthorized`] so the response
    /// cannot be used to probe which tenants or streams exist.
    pub fn into_ingest_error(self) -> IngestError {
        if self.is_rejection() {
            IngestError::Unauthorized
        } else {
            IngestError::infrastructure_with_source("authorization failed", self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("t1").unwrap()
    }

    #[test]
    fn test_rejections_collapse_to_unauthorized() {
        let stream = StreamId::new("s1").unwrap();
        let errors = [
            AuthzError::MissingCredential { tenant: tenant() },
            AuthzError::InvalidCredential { tenant: tenant() },
            AuthzError::UnknownTenant { tenant: tenant() },
            AuthzError::unknown_stream(&tenant(), &stream),
        ];

        for err in errors {
            assert!(err.is_rejection());
            assert!(matches!(err.into_ingest_error(), IngestError::Unauthorized));
        }
    }

    #[test]
    fn test_unavailable_is_infrastructure() {
        let err = AuthzError::Unavailable("connection refused".to_string());
        assert!(err.is_retryable());
        assert!(!err.is_rejection());
        assert!(matches!(
            err.into_ingest_error(),
            IngestError::Infrastructure { .. }
        ));
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(
            AuthzError::UnknownTenant { tenant: tenant() }.reason(),
            "unknown_tenant"
        );
        assert_eq!(AuthzError::Protocol("x".into()).reason(), "protocol");
    }
}
