//! The queue router.
//!
//! Submission to a stream's queue, with lazy provisioning:
//!
//! 1. Derive the queue id from `(tenant, stream)`.
//! 2. Submit.
//! 3. On "not found", create the queue (idempotent) and submit exactly once
//!    more.
//! 4. If the retry still finds no queue, or create fails, give up with a
//!    permanent [`RouterError`].
//!
//! Concurrent first messages to a new stream all race through step 3; the
//! backend's create-succeeds-if-present contract keeps that correct without a
//! lock. The optional [`ProvisionCache`] only lets late racers skip a
//! redundant create.

use std::sync::Arc;

use conduit_core::{DiagnosticsSink, Message, QueueId, StreamId, TenantId};

use crate::cache::ProvisionCache;
use crate::envelope::QueueMessage;
use crate::error::RouterError;
use crate::naming::QueueNaming;
use crate::{Provisioned, QueueBackend};

/// What a successful submit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    /// Queue the message landed on.
    pub queue: QueueId,
    /// Submit attempts made (1 or 2).
    pub attempts: u8,
    /// Whether this call created the queue.
    pub created_queue: bool,
}

/// Routes messages to per-stream queues.
pub struct QueueRouter {
    backend: Arc<dyn QueueBackend>,
    naming: QueueNaming,
    cache: Option<ProvisionCache>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl std::fmt::Debug for QueueRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRouter")
            .field("backend", &self.backend.name())
            .field("naming", &self.naming)
            .field("cache", &self.cache)
            .finish()
    }
}

impl QueueRouter {
    /// Creates a router with default naming and no provisioning cache.
    pub fn new(backend: Arc<dyn QueueBackend>, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            backend,
            naming: QueueNaming::default(),
            cache: None,
            diagnostics,
        }
    }

    /// Uses a custom naming scheme.
    pub fn with_naming(mut self, naming: QueueNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Enables the known-provisioned cache.
    pub fn with_cache(mut self, cache: ProvisionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Naming scheme in use.
    pub fn naming(&self) -> &QueueNaming {
        &self.naming
    }

    /// Provisioning cache, if enabled.
    pub fn cache(&self) -> Option<&ProvisionCache> {
        self.cache.as_ref()
    }

    /// Name of the configured backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn is_known(&self, queue: &QueueId) -> bool {
        self.cache.as_ref().is_some_and(|c| c.contains(queue))
    }

    fn remember(&self, queue: &QueueId) {
        if let Some(cache) = &self.cache {
            cache.remember(queue);
        }
    }

    /// Submits `message` to the queue of `(tenant, stream)`.
    pub async fn submit(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        message: &Message,
    ) -> Result<SubmitReport, RouterError> {
        let queue = self.naming.queue_id(tenant, stream);
        let envelope = QueueMessage::encode(tenant, stream, message);
        let known_before = self.is_known(&queue);

        match self.backend.submit(&queue, &envelope).await {
            Ok(()) => {
                self.remember(&queue);
                return Ok(SubmitReport {
                    queue,
                    attempts: 1,
                    created_queue: false,
                });
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(queue = %queue, "queue not found, provisioning");
            }
            Err(source) => return Err(RouterError::Submit { queue, source }),
        }

        let created_queue = self.provision(tenant, stream, &queue, known_before).await?;

        match self.backend.submit(&queue, &envelope).await {
            Ok(()) => {
                self.remember(&queue);
                Ok(SubmitReport {
                    queue,
                    attempts: 2,
                    created_queue,
                })
            }
            Err(e) if e.is_not_found() => {
                if let Some(cache) = &self.cache {
                    cache.forget_stale(&queue);
                }
                tracing::error!(queue = %queue, "queue still missing after provisioning");
                Err(RouterError::StillMissing { queue })
            }
            Err(source) => Err(RouterError::Submit { queue, source }),
        }
    }

    /// Makes sure the queue exists. Returns `true` if this call created it.
    async fn provision(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        queue: &QueueId,
        known_before: bool,
    ) -> Result<bool, RouterError> {
        if let Some(cache) = &self.cache {
            if known_before {
                // We believed it existed and the backend disagreed.
                cache.forget_stale(queue);
            } else if cache.contains(queue) {
                // Another task provisioned it after our submit went out.
                cache.record_skipped_create();
                tracing::debug!(queue = %queue, "queue provisioned concurrently, skipping create");
                return Ok(false);
            }
        }

        match self.backend.create(queue).await {
            Ok(Provisioned::Created) => {
                self.remember(queue);
                tracing::info!(tenant = %tenant, stream = %stream, queue = %queue, "created queue");
                self.diagnostics
                    .info(tenant, &format!("Created new queue {stream}"));
                Ok(true)
            }
            Ok(Provisioned::AlreadyExisted) => {
                self.remember(queue);
                tracing::debug!(queue = %queue, "queue already existed");
                Ok(false)
            }
            Err(source) => {
                tracing::error!(queue = %queue, error = %source, "failed to provision queue");
                Err(RouterError::Provision {
                    queue: queue.clone(),
                    source,
                })
            }
        }
    }
}
