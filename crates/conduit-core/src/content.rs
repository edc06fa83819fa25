//! Declared content kind of a message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The media type a caller declared for a message body.
///
/// Parameters such as `charset` are ignored when classifying, so
/// `application/json; charset=utf-8` is [`ContentKind::Json`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ContentKind {
    /// `application/json`, the only structured kind eligible for archival.
    Json,
    /// `text/plain`
    Text,
    /// `application/octet-stream`
    OctetStream,
    /// `application/avro`
    Avro,
    /// `application/protobuf`
    Protobuf,
    /// Any other media type, lowercased and without parameters.
    Other(String),
}

impl ContentKind {
    /// Media type assumed when a caller declares none.
    pub const DEFAULT: Self = Self::OctetStream;

    /// Classifies a `Content-Type` header value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Self::Json,
            "text/plain" => Self::Text,
            "application/octet-stream" => Self::OctetStream,
            "application/avro" => Self::Avro,
            "application/protobuf" => Self::Protobuf,
            _ => Self::Other(essence),
        }
    }

    /// Returns the canonical media type string.
    #[must_use]
    pub fn as_mime(&self) -> &str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain",
            Self::OctetStream => "application/octet-stream",
            Self::Avro => "application/avro",
            Self::Protobuf => "application/protobuf",
            Self::Other(mime) => mime,
        }
    }

    /// Returns `true` for the structured kind archival supports.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Json)
    }

    /// Returns `true` for kinds whose bytes are expected to be text.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Json | Self::Text)
    }

    /// Returns `true` for media types the gateway recognizes.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Default for ContentKind {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

impl From<String> for ContentKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ContentKind> for String {
    fn from(kind: ContentKind) -> Self {
        kind.as_mime().to_string()
    }
}
