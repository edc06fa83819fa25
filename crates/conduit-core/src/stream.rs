//! Stream metadata returned by authorization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How long archived records of a stream are kept.
///
/// Any positive number of days is valid. The named tiers render with their
/// tier name so partition paths stay stable (`retention=WEEK`); other values
/// render as `{days}d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Retention {
    days: u32,
}

const TIERS: [(&str, u32); 5] = [
    ("DAY", 1),
    ("WEEK", 7),
    ("THREE_MONTHS", 90),
    ("YEAR", 366),
    ("THREE_YEARS", 1098),
];

impl Retention {
    /// One day.
    pub const DAY: Self = Self { days: 1 };
    /// Seven days.
    pub const WEEK: Self = Self { days: 7 };
    /// Ninety days.
    pub const THREE_MONTHS: Self = Self { days: 90 };
    /// One (leap) year.
    pub const YEAR: Self = Self { days: 366 };
    /// Three (leap) years.
    pub const THREE_YEARS: Self = Self { days: 1098 };
    /// Tier applied when a tenant enables retention without choosing one.
    pub const DEFAULT: Self = Self::THREE_MONTHS;

    /// Creates a retention of `days` days.
    pub fn from_days(days: u32) -> Result<Self, RetentionError> {
        if days == 0 {
            return Err(RetentionError::Zero);
        }
        Ok(Self { days })
    }

    /// Returns the retention in days.
    #[must_use]
    pub const fn days(&self) -> u32 {
        self.days
    }

    /// Returns the tier name if this retention matches a named tier.
    #[must_use]
    pub fn tier_name(&self) -> Option<&'static str> {
        TIERS
            .iter()
            .find(|(_, days)| *days == self.days)
            .map(|(name, _)| *name)
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}d", self.days),
        }
    }
}

/// A retention value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetentionError {
    /// Zero days is not a retention.
    #[error("retention must be at least one day")]
    Zero,
    /// Neither a tier name nor a day count.
    #[error("invalid retention {0:?}, expected a tier name or a day count such as \"30d\"")]
    Invalid(String),
}

impl FromStr for Retention {
    type Err = RetentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((_, days)) = TIERS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        {
            return Self::from_days(*days);
        }

        let digits = trimmed
            .strip_suffix('d')
            .or_else(|| trimmed.strip_suffix('D'))
            .unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .map_err(|_| RetentionError::Invalid(s.to_string()))
            .and_then(Self::from_days)
    }
}

impl TryFrom<String> for Retention {
    type Error = RetentionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Retention> for String {
    fn from(retention: Retention) -> Self {
        retention.to_string()
    }
}

/// What authorization learned about a stream, fetched in the same round trip
/// as the decision itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Archive retention, absent when the stream is not archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
}

impl StreamMetadata {
    /// Metadata for a stream that is never archived.
    #[must_use]
    pub const fn without_retention() -> Self {
        Self { retention: None }
    }

    /// Metadata for a stream archived for `retention`.
    #[must_use]
    pub const fn with_retention(retention: Retention) -> Self {
        Self {
            retention: Some(retention),
        }
    }
}

/// Secret presented by a caller. Redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw credential.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_names() {
        assert_eq!("WEEK".parse::<Retention>().unwrap(), Retention::WEEK);
        assert_eq!(
            "three_months".parse::<Retention>().unwrap(),
            Retention::THREE_MONTHS
        );
    }

    #[test]
    fn test_parse_day_counts() {
        assert_eq!("30d".parse::<Retention>().unwrap().days(), 30);
        assert_eq!("45".parse::<Retention>().unwrap().days(), 45);
        assert_eq!("7d".parse::<Retention>().unwrap(), Retention::WEEK);
    }

    #[test]
    fn test_parse_rejects_zero_and_garbage() {
        assert_eq!("0d".parse::<Retention>().unwrap_err(), RetentionError::Zero);
        assert!(matches!(
            "forever".parse::<Retention>().unwrap_err(),
            RetentionError::Invalid(_)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Retention::YEAR.to_string(), "YEAR");
        assert_eq!(Retention::from_days(30).unwrap().to_string(), "30d");
    }

    #[test]
    fn test_default_tier() {
        assert_eq!(Retention::default().days(), 90);
    }

    #[test]
    fn test_metadata_serde() {
        let meta: StreamMetadata = serde_json::from_str(r#"{"retention":"30d"}"#).unwrap();
        assert_eq!(meta.retention.map(|r| r.days()), Some(30));

        let none: StreamMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(none, StreamMetadata::without_retention());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{credential:?}").contains("super-secret"));
        assert_eq!(credential.expose(), "super-secret");
    }
}
