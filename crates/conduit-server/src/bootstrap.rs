//! Builds the configured backends and injects them into a [`Gateway`].

use std::sync::Arc;
use std::time::Duration;

use conduit_archive::{ArchiveBackend, ArchiveWriter, FsArchiveBackend, MemoryArchiveBackend};
use conduit_authz::{
    AuthorizationGateway, CacheConfig, CachedAuthorizer, RemoteAuthorizer, RemoteConfig,
    StaticAuthorizer,
};
use conduit_config::{
    ArchiveBackendKind, AuthzBackendKind, ConduitConfig, ConfigError, QueueBackendKind,
};
use conduit_core::{DiagnosticsSink, TracingDiagnostics};
use conduit_gateway::{AdmissionController, Gateway};
use conduit_router::{
    MemoryQueueBackend, ProvisionCache, QueueBackend, QueueNaming, QueueRouter, SpoolQueueBackend,
};
use conduit_telemetry::MeteredDiagnostics;

use crate::ServerError;

/// Tenant diagnostics that are logged on the tenant target and counted.
pub fn diagnostics() -> Arc<dyn DiagnosticsSink> {
    Arc::new(MeteredDiagnostics::new(Arc::new(TracingDiagnostics)))
}

/// Authorization backend, wrapped in the decision cache when a TTL is set.
pub fn authorizer(config: &ConduitConfig) -> Result<Arc<dyn AuthorizationGateway>, ServerError> {
    let authz = &config.authz;
    let inner: Arc<dyn AuthorizationGateway> = match authz.backend {
        AuthzBackendKind::Static => {
            if authz.tenants.is_empty() {
                tracing::warn!("Static authorization has no tenants, every message will be rejected");
            }
            Arc::new(StaticAuthorizer::new(authz.tenants.clone()))
        }
        AuthzBackendKind::Remote => {
            let url = authz
                .remote_url
                .clone()
                .ok_or_else(|| ConfigError::missing_field("authz.remote_url"))?;
            let remote = RemoteConfig {
                url,
                timeout: Duration::from_millis(authz.remote_timeout_ms),
            };
            Arc::new(RemoteAuthorizer::new(remote)?)
        }
    };

    if authz.cache_ttl_secs == 0 {
        return Ok(inner);
    }
    let cache = CacheConfig::with_ttl(Duration::from_secs(authz.cache_ttl_secs));
    Ok(Arc::new(CachedAuthorizer::new(inner, cache)))
}

/// Queue backend.
pub async fn queue_backend(config: &ConduitConfig) -> Result<Arc<dyn QueueBackend>, ServerError> {
    let queue = &config.queue;
    let backend: Arc<dyn QueueBackend> = match queue.backend {
        QueueBackendKind::Memory => {
            tracing::warn!(
                capacity = queue.memory_capacity,
                "Using the in-memory queue backend, messages do not survive a restart and full queues drop their oldest message"
            );
            Arc::new(MemoryQueueBackend::with_capacity(queue.memory_capacity))
        }
        QueueBackendKind::Spool => {
            let dir = queue
                .spool_dir
                .clone()
                .ok_or_else(|| ConfigError::missing_field("queue.spool_dir"))?;
            Arc::new(SpoolQueueBackend::open(dir).await?)
        }
    };
    Ok(backend)
}

/// Archive backend, `None` when archival is disabled.
pub async fn archive_backend(
    config: &ConduitConfig,
) -> Result<Option<Arc<dyn ArchiveBackend>>, ServerError> {
    let archive = &config.archive;
    let backend: Option<Arc<dyn ArchiveBackend>> = match archive.backend {
        ArchiveBackendKind::Disabled => None,
        ArchiveBackendKind::Memory => Some(Arc::new(MemoryArchiveBackend::with_capacity(
            archive.memory_capacity,
        ))),
        ArchiveBackendKind::Fs => {
            let root = archive
                .root_dir
                .clone()
                .ok_or_else(|| ConfigError::missing_field("archive.root_dir"))?;
            Some(Arc::new(FsArchiveBackend::open(root).await?))
        }
    };
    Ok(backend)
}

/// Assembles the gateway described by `config`.
pub async fn build_gateway(config: &ConduitConfig) -> Result<Gateway, ServerError> {
    let diagnostics = diagnostics();
    let authorizer = authorizer(config)?;
    let queue = queue_backend(config).await?;

    let naming = QueueNaming::new(&config.queue.name_prefix, &config.queue.name_suffix);
    let mut router = QueueRouter::new(queue, Arc::clone(&diagnostics)).with_naming(naming);
    if config.queue.provision_cache {
        router = router.with_cache(ProvisionCache::new(config.queue.provision_cache_capacity));
    }

    let archive = match archive_backend(config).await? {
        Some(backend) => ArchiveWriter::new(backend, Arc::clone(&diagnostics)),
        None => ArchiveWriter::disabled(Arc::clone(&diagnostics)),
    };

    let admission = AdmissionController::new(config.admission.max_message_bytes)
        .with_drain_limit(config.admission.drain_limit_bytes);

    tracing::info!(
        authz = authorizer.name(),
        queue = router.backend_name(),
        archive = archive.is_enabled(),
        max_message_bytes = admission.ceiling(),
        "Gateway assembled"
    );

    Ok(Gateway::new(authorizer, router, archive, diagnostics).with_admission(admission))
}
