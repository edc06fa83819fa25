//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//!
//! 1. Built-in defaults
//! 2. A TOML or JSON file (format chosen by extension)
//! 3. A `.env` file, loaded into the process environment
//! 4. Environment variables `PREFIX__SECTION__KEY`

use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{ArchiveBackendKind, AuthzBackendKind, QueueBackendKind};
use crate::{ConduitConfig, ConfigError};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "CONDUIT";

/// Builds a [`ConduitConfig`] from layered sources.
///
/// ```no_run
/// use conduit_config::ConfigLoader;
///
/// # fn main() -> Result<(), conduit_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("conduit.toml")?
///     .with_dotenv()
///     .with_env_prefix("CONDUIT")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ConduitConfig,
    env_prefix: Option<String>,
    source: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Starts from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ConduitConfig::default(),
            env_prefix: None,
            source: None,
        }
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ConduitConfig::development();
        self
    }

    /// Loads a configuration file, replacing everything loaded so far.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or has an unrecognized extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.config = Self::parse(&content, format)?;
        self.source = Some(path.to_path_buf());
        Ok(self)
    }

    /// Loads a configuration file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = Self::parse(content, format)?;
        Ok(self)
    }

    /// Loads `.env` from the working directory, if present.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Enables environment overrides under `prefix`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// File the configuration was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override is malformed or validation
    /// fails.
    pub fn load(self) -> Result<ConduitConfig, ConfigError> {
        self.load_from_vars(std::env::vars())
    }

    /// Like [`load`](Self::load), with overrides taken from `vars`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override is malformed or validation
    /// fails.
    pub fn load_from_vars<I>(mut self, vars: I) -> Result<ConduitConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if let Some(prefix) = self.env_prefix.take() {
            for (key, value) in vars {
                if let Some(path) = key
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix("__"))
                {
                    let parts: Vec<&str> = path.split("__").collect();
                    apply_override(&mut self.config, &parts, &key, &value)?;
                }
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ConduitConfig {
        self.config
    }

    fn parse(content: &str, format: &str) -> Result<ConduitConfig, ConfigError> {
        match format.to_lowercase().as_str() {
            "toml" => Ok(toml::from_str(content)?),
            "json" => Ok(serde_json::from_str(content)?),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

fn apply_override(
    config: &mut ConduitConfig,
    parts: &[&str],
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match parts {
        ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            config.server.shutdown_timeout_secs = parse_num(key, value)?;
        }
        ["SERVER", "REQUEST_TIMEOUT_SECS"] => {
            config.server.request_timeout_secs = parse_num(key, value)?;
        }
        ["SERVER", "MAX_CONNECTIONS"] => config.server.max_connections = parse_num(key, value)?,

        ["ADMISSION", "MAX_MESSAGE_BYTES"] => {
            config.admission.max_message_bytes = parse_num(key, value)?;
        }
        ["ADMISSION", "DRAIN_LIMIT_BYTES"] => {
            config.admission.drain_limit_bytes = parse_num(key, value)?;
        }

        ["QUEUE", "BACKEND"] => {
            config.queue.backend = match value.to_lowercase().as_str() {
                "memory" => QueueBackendKind::Memory,
                "spool" => QueueBackendKind::Spool,
                _ => return Err(ConfigError::env_parse_error(key, "expected 'memory' or 'spool'")),
            };
        }
        ["QUEUE", "SPOOL_DIR"] => config.queue.spool_dir = non_empty(value).map(PathBuf::from),
        ["QUEUE", "NAME_PREFIX"] => config.queue.name_prefix = value.to_string(),
        ["QUEUE", "NAME_SUFFIX"] => config.queue.name_suffix = value.to_string(),
        ["QUEUE", "PROVISION_CACHE"] => config.queue.provision_cache = parse_bool_var(key, value)?,
        ["QUEUE", "PROVISION_CACHE_CAPACITY"] => {
            config.queue.provision_cache_capacity = parse_num(key, value)?;
        }
        ["QUEUE", "MEMORY_CAPACITY"] => config.queue.memory_capacity = parse_num(key, value)?,

        ["ARCHIVE", "BACKEND"] => {
            config.archive.backend = match value.to_lowercase().as_str() {
                "disabled" => ArchiveBackendKind::Disabled,
                "memory" => ArchiveBackendKind::Memory,
                "fs" => ArchiveBackendKind::Fs,
                _ => {
                    return Err(ConfigError::env_parse_error(
                        key,
                        "expected 'disabled', 'memory', or 'fs'",
                    ))
                }
            };
        }
        ["ARCHIVE", "ROOT_DIR"] => config.archive.root_dir = non_empty(value).map(PathBuf::from),
        ["ARCHIVE", "MEMORY_CAPACITY"] => config.archive.memory_capacity = parse_num(key, value)?,

        ["AUTHZ", "BACKEND"] => {
            config.authz.backend = match value.to_lowercase().as_str() {
                "static" => AuthzBackendKind::Static,
                "remote" => AuthzBackendKind::Remote,
                _ => return Err(ConfigError::env_parse_error(key, "expected 'static' or 'remote'")),
            };
        }
        ["AUTHZ", "REMOTE_URL"] => config.authz.remote_url = non_empty(value).map(str::to_string),
        ["AUTHZ", "REMOTE_TIMEOUT_MS"] => config.authz.remote_timeout_ms = parse_num(key, value)?,
        ["AUTHZ", "CACHE_TTL_SECS"] => config.authz.cache_ttl_secs = parse_num(key, value)?,

        ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
        ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),
        ["TELEMETRY", "LOGGING", "ENABLED"] => {
            config.telemetry.logging.enabled = parse_bool_var(key, value)?;
        }
        ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
        ["TELEMETRY", "LOGGING", "JSON_FORMAT"] => {
            config.telemetry.logging.json_format = parse_bool_var(key, value)?;
        }
        ["TELEMETRY", "METRICS", "ENABLED"] => {
            config.telemetry.metrics.enabled = parse_bool_var(key, value)?;
        }
        ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),
        ["TELEMETRY", "TRACING", "ENABLED"] => {
            config.telemetry.tracing.enabled = parse_bool_var(key, value)?;
        }
        ["TELEMETRY", "TRACING", "OTLP_ENDPOINT"] => {
            config.telemetry.tracing.otlp_endpoint = value.to_string();
        }
        ["TELEMETRY", "TRACING", "SAMPLE_RATIO"] => {
            config.telemetry.tracing.sample_ratio = value
                .parse()
                .map_err(|_| ConfigError::env_parse_error(key, "expected float"))?;
        }

        // Tenant tables do not fit in a flat variable namespace.
        _ => {}
    }
    Ok(())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
