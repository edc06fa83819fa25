//! Configuration schema types.

use std::collections::HashMap;
use std::path::PathBuf;

use conduit_authz::TenantPolicy;
use conduit_core::TenantId;
use serde::Deserialize;

/// HTTP server section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g. `0.0.0.0:8080`).
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// How long shutdown waits for in-flight connections.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Upper bound on time spent handling one request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    10_000
}

/// Admission section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Largest accepted message body.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// How much of an oversized body is discarded before the connection is
    /// closed instead.
    #[serde(default = "default_drain_limit_bytes")]
    pub drain_limit_bytes: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: default_max_message_bytes(),
            drain_limit_bytes: default_drain_limit_bytes(),
        }
    }
}

fn default_max_message_bytes() -> usize {
    256 * 1024
}

fn default_drain_limit_bytes() -> usize {
    1024 * 1024
}

/// Queue backend kind.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    /// Process-local queues.
    #[default]
    Memory,
    /// One directory per queue on local disk.
    Spool,
}

/// Queue section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: QueueBackendKind,

    /// Spool root, required for the spool backend.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,

    /// Prefix of every queue name.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Suffix of every queue name.
    #[serde(default)]
    pub name_suffix: String,

    /// Remember provisioned queues to skip redundant creates.
    #[serde(default = "default_true")]
    pub provision_cache: bool,

    /// Entries the provisioning cache holds before it is reset.
    #[serde(default = "default_provision_cache_capacity")]
    pub provision_cache_capacity: usize,

    /// Messages each in-memory queue keeps before dropping the oldest.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackendKind::default(),
            spool_dir: None,
            name_prefix: default_name_prefix(),
            name_suffix: String::new(),
            provision_cache: true,
            provision_cache_capacity: default_provision_cache_capacity(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_name_prefix() -> String {
    "customer-".to_string()
}

fn default_provision_cache_capacity() -> usize {
    100_000
}

fn default_memory_capacity() -> usize {
    10_000
}

/// Archive backend kind.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackendKind {
    /// No archival.
    #[default]
    Disabled,
    /// Process-local records.
    Memory,
    /// Partitioned JSON files on local disk.
    Fs,
}

/// Archive section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: ArchiveBackendKind,

    /// Archive root, required for the fs backend.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Records the in-memory backend keeps before dropping the oldest.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackendKind::default(),
            root_dir: None,
            memory_capacity: default_memory_capacity(),
        }
    }
}

/// Authorization backend kind.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthzBackendKind {
    /// Tenant table from this file.
    #[default]
    Static,
    /// Remote authorization service.
    Remote,
}

/// Authorization section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: AuthzBackendKind,

    /// Static tenant table.
    #[serde(default)]
    pub tenants: HashMap<TenantId, TenantPolicy>,

    /// Remote service URL, required for the remote backend.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Remote call timeout.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// How long allow decisions are cached. `0` disables the cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            backend: AuthzBackendKind::default(),
            tenants: HashMap::new(),
            remote_url: None,
            remote_timeout_ms: default_remote_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_remote_timeout_ms() -> u64 {
    2_000
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}
