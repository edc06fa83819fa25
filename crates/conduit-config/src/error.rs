//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read the configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File format not recognized.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range or malformed.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A value required by another setting is missing.
    #[error("missing required configuration field: {field}")]
    MissingField {
        /// Dotted field path.
        field: String,
    },

    /// Environment override could not be parsed.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// Variable name.
        var: String,
        /// Why parsing failed.
        reason: String,
    },
}

impl ConfigError {
    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an environment parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error came from [`validate`](crate::ConduitConfig::validate).
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidValue { .. } | Self::MissingField { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::invalid_value("admission.max_message_bytes", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for admission.max_message_bytes: must be positive"
        );
        assert!(err.is_validation_error());

        let err = ConfigError::env_parse_error("CONDUIT__SERVER__MAX_CONNECTIONS", "expected integer");
        assert!(err.to_string().contains("CONDUIT__SERVER__MAX_CONNECTIONS"));
        assert!(!err.is_validation_error());
    }

    #[test]
    fn test_file_not_found() {
        let err = ConfigError::file_not_found("/etc/conduit.toml");
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        assert!(err.to_string().contains("/etc/conduit.toml"));
    }
}
