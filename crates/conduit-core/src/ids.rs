//! Tenant, stream and queue identifiers.
//!
//! Tenant ids allow ASCII alphanumerics and `-`; stream ids allow ASCII
//! alphanumerics and `_`. Because a stream id can never contain `-`, the
//! queue name `{tenant}-{stream}` splits unambiguously at its last `-`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a tenant or stream identifier.
pub const MAX_ID_LEN: usize = 64;

/// An identifier failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("{kind} id must not be empty")]
    Empty {
        /// Which identifier.
        kind: &'static str,
    },

    /// The identifier exceeded [`MAX_ID_LEN`].
    #[error("{kind} id exceeds {MAX_ID_LEN} characters")]
    TooLong {
        /// Which identifier.
        kind: &'static str,
    },

    /// The identifier contained a forbidden character.
    #[error("{kind} id contains invalid character {ch:?}")]
    InvalidChar {
        /// Which identifier.
        kind: &'static str,
        /// The offending character.
        ch: char,
    },
}

fn validate(kind: &'static str, value: &str, extra: char) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty { kind });
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdError::TooLong { kind });
    }
    if let Some(ch) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == extra))
    {
        return Err(IdError::InvalidChar { kind, ch });
    }
    Ok(())
}

macro_rules! validated_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $extra:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps an identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate($kind, &value, $extra)?;
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

validated_id!(
    /// Identifier of a tenant (account), the namespace owning streams.
    TenantId,
    "tenant",
    '-'
);

validated_id!(
    /// Tenant-scoped identifier of a stream.
    StreamId,
    "stream",
    '_'
);

/// Logical queue identifier derived from a `(tenant, stream)` pair.
///
/// Constructed by the queue router's naming scheme; backends treat it as an
/// opaque name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    /// Wraps a fully formed queue name.
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the queue name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
