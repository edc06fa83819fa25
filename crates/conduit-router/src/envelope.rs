//! Wire envelope for queued messages.
//!
//! Queues carry text, so binary payloads travel base64 encoded. JSON and plain
//! text travel verbatim when they are valid UTF-8.

use std::time::UNIX_EPOCH;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use conduit_core::{ContentKind, Message, StreamId, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How [`QueueMessage::body`] is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Body is the payload as UTF-8 text.
    Utf8,
    /// Body is the payload base64 encoded.
    Base64,
}

/// A message as stored on a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Message id assigned at admission.
    pub message_id: Uuid,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Target stream.
    pub stream: StreamId,
    /// Declared media type.
    pub content_type: String,
    /// Body encoding.
    pub encoding: Encoding,
    /// Encoded payload.
    pub body: String,
    /// Arrival time in milliseconds since the Unix epoch.
    pub received_at_ms: u64,
}

impl QueueMessage {
    /// Encodes an admitted message.
    pub fn encode(tenant: &TenantId, stream: &StreamId, message: &Message) -> Self {
        let (encoding, body) = encode_body(tenant, stream, &message.content_kind, &message.payload);
        let received_at_ms = message
            .received_at
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();

        Self {
            message_id: message.id,
            tenant: tenant.clone(),
            stream: stream.clone(),
            content_type: message.content_kind.as_mime().to_string(),
            encoding,
            body,
            received_at_ms,
        }
    }

    /// Decodes the original payload bytes.
    pub fn payload(&self) -> Result<Bytes, base64::DecodeError> {
        match self.encoding {
            Encoding::Utf8 => Ok(Bytes::from(self.body.clone().into_bytes())),
            Encoding::Base64 => BASE64.decode(&self.body).map(Bytes::from),
        }
    }
}

fn encode_body(
    tenant: &TenantId,
    stream: &StreamId,
    kind: &ContentKind,
    payload: &[u8],
) -> (Encoding, String) {
    if kind.is_textual() {
        if let Ok(text) = std::str::from_utf8(payload) {
            return (Encoding::Utf8, text.to_string());
        }
        tracing::warn!(tenant = %tenant, stream = %stream, content_type = %kind, "payload is not valid UTF-8, sending as base64");
    } else if !kind.is_known() {
        tracing::warn!(tenant = %tenant, stream = %stream, content_type = %kind, "unknown content type, sending as base64");
    }
    (Encoding::Base64, BASE64.encode(payload))
}
