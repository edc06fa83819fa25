//! Authorization delegated to an account service over HTTP.
//!
//! One `POST` per message carries tenant, stream and credential; the reply
//! carries the decision and the stream metadata together.
//!
//! | Status | Meaning |
//! |---|---|
//! | 200 | allowed, body is [`StreamMetadata`] |
//! | 401 / 402 / 403 | credential rejected |
//! | 404 | unknown tenant or stream (`{"reason": "unknown_tenant"}` distinguishes) |
//! | 5xx | backend unavailable |

use std::time::Duration;

use async_trait::async_trait;
use conduit_core::{Credential, StreamId, StreamMetadata, TenantId};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, AuthzResult};
use crate::AuthorizationGateway;

/// Remote authorizer configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Endpoint receiving authorization requests.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Creates a configuration with a 2 second timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    tenant: &'a str,
    stream: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    reason: Option<String>,
}

/// Authorizes by calling a remote account service.
#[derive(Debug, Clone)]
pub struct RemoteAuthorizer {
    client: reqwest::Client,
    url: String,
}

impl RemoteAuthorizer {
    /// Builds an authorizer with its own HTTP client.
    pub fn new(config: RemoteConfig) -> AuthzResult<Self> {
        if config.url.is_empty() {
            return Err(AuthzError::Config("remote authorization url is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthzError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self::with_client(client, config.url))
    }

    /// Builds an authorizer sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

fn map_rejection(
    status: StatusCode,
    body: &[u8],
    tenant: &TenantId,
    stream: &StreamId,
) -> AuthzError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
            AuthzError::InvalidCredential {
                tenant: tenant.clone(),
            }
        }
        StatusCode::NOT_FOUND => {
            let body: RejectionBody = serde_json::from_slice(body).unwrap_or_default();
            if body.reason.as_deref() == Some("unknown_tenant") {
                AuthzError::UnknownTenant {
                    tenant: tenant.clone(),
                }
            } else {
                AuthzError::unknown_stream(tenant, stream)
            }
        }
        s if s.is_server_error() => AuthzError::Unavailable(format!("account service returned {s}")),
        s => AuthzError::Protocol(format!("unexpected status {s}")),
    }
}

#[async_trait]
impl AuthorizationGateway for RemoteAuthorizer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn authorize(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        credential: Option<&Credential>,
    ) -> AuthzResult<StreamMetadata> {
        let credential = credential.ok_or_else(|| AuthzError::MissingCredential {
            tenant: tenant.clone(),
        })?;

        let response = self
            .client
            .post(&self.url)
            .json(&AuthorizeRequest {
                tenant: tenant.as_str(),
                stream: stream.as_str(),
                credential: Some(credential.expose()),
            })
            .send()
            .await
            .map_err(|e| AuthzError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AuthzError::Unavailable(e.to_string()))?;

        if status == StatusCode::OK {
            return serde_json::from_slice(&body)
                .map_err(|e| AuthzError::Protocol(format!("invalid metadata: {e}")));
        }

        Err(map_rejection(status, &body, tenant, stream))
    }
}
