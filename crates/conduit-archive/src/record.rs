//! Archive records and their storage layout.
//!
//! Records are partitioned for batch query engines:
//!
//! ```text
//! retention=WEEK/tenant=acme/stream=clicks/year=2024/month=03/day=07/hour=14/
//! ```
//!
//! Stored JSON objects are enriched with the metadata fields below so a
//! query over the archive can recover routing information without parsing
//! paths. Enrichment happens when the record is built; backends only store
//! [`ArchiveRecord::body`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use conduit_core::{Message, Retention, StreamId, TenantId};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ArchiveError, ArchiveResult};

/// Field carrying the message id.
pub const FIELD_MESSAGE_ID: &str = "_conduit_message_id";
/// Field carrying the retention tier.
pub const FIELD_RETENTION: &str = "_conduit_retention";
/// Field carrying the tenant id.
pub const FIELD_TENANT: &str = "_conduit_tenant";
/// Field carrying the stream id.
pub const FIELD_STREAM: &str = "_conduit_stream";

/// A message bound for the retention store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// Message id assigned at admission.
    pub message_id: Uuid,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Source stream.
    pub stream: StreamId,
    /// Enriched JSON object, exactly as stored.
    pub body: Bytes,
    /// How long the store keeps the record.
    pub retention: Retention,
    /// Arrival time, used for partitioning.
    pub received_at: DateTime<Utc>,
}

impl ArchiveRecord {
    /// Builds a record for an admitted message.
    ///
    /// Fails with [`ArchiveError::InvalidRecord`] when the payload is not a
    /// JSON object.
    pub fn new(
        tenant: &TenantId,
        stream: &StreamId,
        message: &Message,
        retention: Retention,
    ) -> ArchiveResult<Self> {
        let body = enrich(&message.payload, message.id, retention, tenant, stream)?;
        Ok(Self {
            message_id: message.id,
            tenant: tenant.clone(),
            stream: stream.clone(),
            body: Bytes::from(body),
            retention,
            received_at: DateTime::<Utc>::from(message.received_at),
        })
    }

    /// Relative directory the record belongs in, with a trailing `/`.
    pub fn partition_prefix(&self) -> String {
        format!(
            "retention={}/tenant={}/stream={}/{}",
            self.retention,
            self.tenant,
            self.stream,
            self.received_at.format("year=%Y/month=%m/day=%d/hour=%H/")
        )
    }
}

/// Parses `payload` as a JSON object and adds the metadata fields.
///
/// Fields the tenant set with the same names are overwritten.
fn enrich(
    payload: &[u8],
    message_id: Uuid,
    retention: Retention,
    tenant: &TenantId,
    stream: &StreamId,
) -> ArchiveResult<Vec<u8>> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| ArchiveError::InvalidRecord(e.to_string()))?;
    let mut object: Map<String, Value> = match value {
        Value::Object(object) => object,
        other => {
            return Err(ArchiveError::InvalidRecord(format!(
                "expected an object, found {}",
                json_kind(&other)
            )))
        }
    };

    object.insert(FIELD_MESSAGE_ID.into(), Value::String(message_id.to_string()));
    object.insert(FIELD_RETENTION.into(), Value::String(retention.to_string()));
    object.insert(FIELD_TENANT.into(), Value::String(tenant.to_string()));
    object.insert(FIELD_STREAM.into(), Value::String(stream.to_string()));

    serde_json::to_vec(&object).map_err(|e| ArchiveError::InvalidRecord(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
