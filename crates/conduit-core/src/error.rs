//! Error types for Conduit.
//!
//! [`IngestError`] is the caller-facing taxonomy. Every stage of the ingest
//! pipeline reports its own typed error; the orchestrator collapses those into
//! one of the variants here before anything reaches the transport.
//!
//! | Variant | Category | Status |
//! |---|---|---|
//! | `BadRequest` | `Client` | 400 |
//! | `Unauthorized` | `Client` | 401 |
//! | `PayloadTooLarge` | `Client` | 413 |
//! | `Infrastructure` | `Infrastructure` | 503 |
//! | `Internal` | `Internal` | 500 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`IngestError`].
pub type IngestResult<T> = Result<T, IngestError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The caller sent something the gateway will never accept as-is.
    Client,
    /// A backend the gateway depends on failed permanently for this message.
    Infrastructure,
    /// A bug or unexpected state inside the gateway.
    Internal,
}

impl ErrorCategory {
    /// Returns `true` if a caller may reasonably retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure)
    }
}

/// Caller-visible ingest failure.
///
/// Never carries the reason an authorization was rejected: unknown tenant,
/// unknown stream and bad credential are indistinguishable to the caller.
///
/// # Example
///
/// ```
/// use conduit_core::{ErrorCategory, IngestError};
///
/// let err = IngestError::payload_too_large(262_144);
/// assert_eq!(err.category(), ErrorCategory::Client);
/// assert_eq!(err.status_code().as_u16(), 413);
/// ```
#[derive(Error, Debug)]
pub enum IngestError {
    /// Malformed request (bad tenant or stream identifier).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization failed for any reason.
    #[error("Unauthorized")]
    Unauthorized,

    /// Body exceeded the admission ceiling.
    #[error("Payload exceeds the maximum message size of {limit} bytes")]
    PayloadTooLarge {
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// Permanent failure of a required backend.
    #[error("Infrastructure error: {message}")]
    Infrastructure {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl IngestError {
    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a payload-too-large error for the given ceiling.
    #[must_use]
    pub const fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Creates an infrastructure error without an underlying cause.
    #[must_use]
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an infrastructure error wrapping the backend failure.
    pub fn infrastructure_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Infrastructure {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::BadRequest { .. } | Self::Unauthorized | Self::PayloadTooLarge { .. } => {
                ErrorCategory::Client
            }
            Self::Infrastructure { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Infrastructure { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a stable, machine-readable reason code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Infrastructure { .. } => "INFRASTRUCTURE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// Infrastructure and internal failures get a generic message so backend
    /// details stay in operator logs.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let message = match self {
            Self::Infrastructure { .. } => "Message could not be accepted, retry later".to_string(),
            Self::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        };

        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
                category: self.category(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_too_large() {
        let error = IngestError::payload_too_large(1024);
        assert_eq!(error.category(), ErrorCategory::Client);
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(error.to_string().contains("1024"));
    }

    #[test]
    fn test_unauthorized_has_no_reason() {
        let error = IngestError::Unauthorized;
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.to_string(), "Unauthorized");
    }

    #[test]
    fn test_infrastructure_error_is_retryable() {
        let error = IngestError::infrastructure_with_source(
            "queue unavailable",
            std::io::Error::other("connection reset"),
        );
        assert_eq!(error.category(), ErrorCategory::Infrastructure);
        assert!(error.category().is_retryable());
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!IngestError::Unauthorized.category().is_retryable());
        assert!(!IngestError::bad_request("bad").category().is_retryable());
    }

    #[test]
    fn test_envelope_hides_backend_details() {
        let error = IngestError::infrastructure("spool directory not writable: /var/spool");
        let envelope = error.to_envelope(Some("req-1"));

        assert_eq!(envelope.error.code, "INFRASTRUCTURE_ERROR");
        assert!(!envelope.error.message.contains("/var/spool"));
        assert_eq!(envelope.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = IngestError::Unauthorized.to_envelope(None);
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
        assert_eq!(json["error"]["category"], "client");
        assert!(json.get("request_id").is_none());
    }
}
