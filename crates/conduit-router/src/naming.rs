//! Deterministic queue naming.
//!
//! `{prefix}{tenant}-{stream}{suffix}`. Stream ids cannot contain `-`, so the
//! last `-` before the suffix always separates tenant from stream and the
//! mapping is one-to-one.

use conduit_core::{QueueId, StreamId, TenantId};

/// Default prefix for tenant queues.
pub const DEFAULT_PREFIX: &str = "customer-";

/// Maps `(tenant, stream)` pairs to queue ids and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNaming {
    prefix: String,
    suffix: String,
}

impl Default for QueueNaming {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, "")
    }
}

impl QueueNaming {
    /// Creates a naming scheme.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Queue id for a stream.
    pub fn queue_id(&self, tenant: &TenantId, stream: &StreamId) -> QueueId {
        QueueId::from_name(format!(
            "{}{}-{}{}",
            self.prefix, tenant, stream, self.suffix
        ))
    }

    /// Recovers the stream id from a queue name belonging to `tenant`.
    ///
    /// Returns `None` for queues of other tenants or names outside this scheme.
    pub fn stream_from_queue_name(&self, tenant: &TenantId, name: &str) -> Option<StreamId> {
        let inner = name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix(tenant.as_str())?
            .strip_prefix('-')?
            .strip_suffix(self.suffix.as_str())?;
        StreamId::new(inner).ok()
    }

    /// Pattern matching every tenant queue, e.g. for access policies.
    pub fn wildcard(&self) -> String {
        format!("{}*{}", self.prefix, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn s(id: &str) -> StreamId {
        StreamId::new(id).unwrap()
    }

    #[test]
    fn test_default_naming() {
        let naming = QueueNaming::default();
        assert_eq!(
            naming.queue_id(&t("acme"), &s("clicks")).as_str(),
            "customer-acme-clicks"
        );
        assert_eq!(naming.wildcard(), "customer-*");
    }

    #[test]
    fn test_suffix() {
        let naming = QueueNaming::new("customer-", ".fifo");
        let queue = naming.queue_id(&t("acme"), &s("clicks"));
        assert_eq!(queue.as_str(), "customer-acme-clicks.fifo");
        assert_eq!(
            naming.stream_from_queue_name(&t("acme"), queue.as_str()),
            Some(s("clicks"))
        );
    }

    #[test]
    fn test_inverse_rejects_other_tenants() {
        let naming = QueueNaming::default();
        let queue = naming.queue_id(&t("acme-eu"), &s("clicks"));

        assert_eq!(naming.stream_from_queue_name(&t("acme"), queue.as_str()), None);
        assert_eq!(
            naming.stream_from_queue_name(&t("acme-eu"), queue.as_str()),
            Some(s("clicks"))
        );
        assert_eq!(naming.stream_from_queue_name(&t("acme"), "other-acme-x"), None);
    }

    proptest! {
        #[test]
        fn test_naming_is_injective(
            t1 in "[a-z0-9-]{1,12}", s1 in "[a-z0-9_]{1,12}",
            t2 in "[a-z0-9-]{1,12}", s2 in "[a-z0-9_]{1,12}",
        ) {
            let naming = QueueNaming::default();
            let q1 = naming.queue_id(&t(&t1), &s(&s1));
            let q2 = naming.queue_id(&t(&t2), &s(&s2));
            prop_assert_eq!(q1 == q2, t1 == t2 && s1 == s2);
        }

        #[test]
        fn test_inverse_round_trips(tenant in "[a-z0-9-]{1,12}", stream in "[a-z0-9_]{1,12}") {
            let naming = QueueNaming::new("p-", ".q");
            let queue = naming.queue_id(&t(&tenant), &s(&stream));
            prop_assert_eq!(
                naming.stream_from_queue_name(&t(&tenant), queue.as_str()),
                Some(s(&stream))
            );
        }
    }
}
