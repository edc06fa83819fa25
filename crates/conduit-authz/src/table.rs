//! Static tenant table, loaded from configuration.
//!
//! Suitable for single-tenant deployments and tests. Each tenant lists the
//! API keys it accepts and the streams it owns.
//!
//! Keys are compared in constant time, against every key of the tenant, and
//! against a decoy when the tenant is unknown, so response timing does not
//! reveal which tenants exist.

use std::collections::HashMap;

use async_trait::async_trait;
use conduit_core::{Credential, Retention, StreamId, StreamMetadata, TenantId};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};

use crate::error::{AuthzError, AuthzResult};
use crate::AuthorizationGateway;

/// Per-stream settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamPolicy {
    /// Archive retention; absent disables archival for the stream.
    #[serde(default)]
    pub retention: Option<Retention>,
}

/// Per-tenant settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantPolicy {
    /// API keys accepted for this tenant.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Streams owned by this tenant.
    #[serde(default)]
    pub streams: HashMap<StreamId, StreamPolicy>,

    /// Accept streams not listed in `streams`.
    #[serde(default)]
    pub allow_unlisted_streams: bool,

    /// Retention applied to unlisted streams when they are accepted.
    #[serde(default)]
    pub default_retention: Option<Retention>,
}

impl TenantPolicy {
    /// Creates a tenant accepting a single key.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            api_keys: vec![key.into()],
            ..Self::default()
        }
    }

    /// Adds a stream.
    pub fn stream(mut self, stream: StreamId, retention: Option<Retention>) -> Self {
        self.streams.insert(stream, StreamPolicy { retention });
        self
    }

    /// Accepts any stream, archiving with `retention`.
    pub fn any_stream(mut self, retention: Option<Retention>) -> Self {
        self.allow_unlisted_streams = true;
        self.default_retention = retention;
        self
    }

    fn accepts(&self, credential: &Credential) -> bool {
        let presented = credential.expose().as_bytes();
        let matched = self
            .api_keys
            .iter()
            .fold(Choice::from(0), |acc, key| acc | key.as_bytes().ct_eq(presented));
        matched.into()
    }
}

/// Compared against when the tenant is unknown.
const DECOY_KEY: &[u8] = b"conduit-decoy-key-never-accepted";

/// Authorizes against an in-memory tenant table.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    tenants: HashMap<TenantId, TenantPolicy>,
}

impl StaticAuthorizer {
    /// Creates an authorizer over `tenants`.
    pub fn new(tenants: HashMap<TenantId, TenantPolicy>) -> Self {
        Self { tenants }
    }

    /// Adds or replaces a tenant.
    pub fn with_tenant(mut self, tenant: TenantId, policy: TenantPolicy) -> Self {
        self.tenants.insert(tenant, policy);
        self
    }

    /// Number of configured tenants.
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}

#[async_trait]
impl AuthorizationGateway for StaticAuthorizer {
    fn name(&self) -> &'static str {
        "static"
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

        let Some(policy) = self.tenants.get(tenant) else {
            let _ = DECOY_KEY.ct_eq(credential.expose().as_bytes());
            return Err(AuthzError::UnknownTenant {
                tenant: tenant.clone(),
            });
        };

        if !policy.accepts(credential) {
            return Err(AuthzError::InvalidCredential {
                tenant: tenant.clone(),
            });
        }

        match policy.streams.get(stream) {
            Some(stream_policy) => Ok(StreamMetadata {
                retention: stream_policy.retention,
            }),
            None if policy.allow_unlisted_streams => Ok(StreamMetadata {
                retention: policy.default_retention,
            }),
            None => Err(AuthzError::unknown_stream(tenant, stream)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn stream(id: &str) -> StreamId {
        StreamId::new(id).unwrap()
    }

    fn authorizer() -> StaticAuthorizer {
        StaticAuthorizer::default().with_tenant(
            tenant("t1"),
            TenantPolicy::with_key("key-1")
                .stream(stream("s1"), None)
                .stream(stream("s2"), Some(Retention::from_days(30).unwrap())),
        )
    }

    #[tokio::test]
    async fn test_authorize_returns_retention() {
        let key = Credential::new("key-1");
        let auth = authorizer();

        let s1 = auth
            .authorize(&tenant("t1"), &stream("s1"), Some(&key))
            .await
            .unwrap();
        assert_eq!(s1.retention, None);

        let s2 = auth
            .authorize(&tenant("t1"), &stream("s2"), Some(&key))
            .await
            .unwrap();
        assert_eq!(s2.retention.map(|r| r.days()), Some(30));
    }

    #[tokio::test]
    async fn test_rejection_reasons() {
        let auth = authorizer();
        let good = Credential::new("key-1");
        let bad = Credential::new("nope");

        let err = auth
            .authorize(&tenant("t1"), &stream("s1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::MissingCredential { .. }));

        let err = auth
            .authorize(&tenant("t1"), &stream("s1"), Some(&bad))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidCredential { .. }));

        let err = auth
            .authorize(&tenant("t9"), &stream("s1"), Some(&good))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::UnknownTenant { .. }));

        let err = auth
            .authorize(&tenant("t1"), &stream("s9"), Some(&good))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::UnknownStream { .. }));
    }

    #[tokio::test]
    async fn test_unknown_stream_checked_after_credential() {
        let err = authorizer()
            .authorize(&tenant("t1"), &stream("s9"), Some(&Credential::new("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidCredential { .. }));
    }

    #[tokio::test]
    async fn test_any_configured_key_is_accepted() {
        let mut policy = TenantPolicy::with_key("key-1").stream(stream("s1"), None);
        policy.api_keys.push("key-2".to_string());
        let auth = StaticAuthorizer::default().with_tenant(tenant("t1"), policy);

        for key in ["key-1", "key-2"] {
            assert!(auth
                .authorize(&tenant("t1"), &stream("s1"), Some(&Credential::new(key)))
                .await
                .is_ok());
        }
        for key in ["key-", "key-12", "", "KEY-1"] {
            let err = auth
                .authorize(&tenant("t1"), &stream("s1"), Some(&Credential::new(key)))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthzError::InvalidCredential { .. }), "{key}");
        }
    }

    #[tokio::test]
    async fn test_decoy_key_never_authorizes() {
        let decoy = Credential::new(String::from_utf8(DECOY_KEY.to_vec()).unwrap());
        let err = authorizer()
            .authorize(&tenant("t9"), &stream("s1"), Some(&decoy))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::UnknownTenant { .. }));
    }

    #[tokio::test]
    async fn test_unlisted_streams() {
        let auth = StaticAuthorizer::default().with_tenant(
            tenant("t1"),
            TenantPolicy::with_key("k").any_stream(Some(Retention::WEEK)),
        );

        let meta = auth
            .authorize(&tenant("t1"), &stream("anything"), Some(&Credential::new("k")))
            .await
            .unwrap();
        assert_eq!(meta.retention, Some(Retention::WEEK));
    }

    #[test]
    fn test_policy_deserialize() {
        let policy: TenantPolicy = serde_json::from_str(
            r#"{"api_keys":["k1"],"streams":{"clicks":{"retention":"WEEK"},"raw":{}}}"#,
        )
        .unwrap();

        assert_eq!(policy.api_keys, vec!["k1"]);
        assert_eq!(
            policy.streams[&stream("clicks")].retention,
            Some(Retention::WEEK)
        );
        assert_eq!(policy.streams[&stream("raw")].retention, None);
    }
}
