//! Decision caching for authorization.
//!
//! Caches allowed decisions (with their stream metadata) so repeated traffic
//! to the same stream skips the account service. Rejections are never cached:
//! a tenant fixing a bad key should see the effect immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conduit_core::{Credential, StreamId, StreamMetadata, TenantId};
use parking_lot::RwLock;

use crate::error::AuthzResult;
use crate::AuthorizationGateway;

/// Configuration for the decision cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Time-to-live for cached decisions.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Cache with the given TTL and default capacity.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Disable caching.
    pub fn disabled() -> Self {
        Self {
            max_entries: 0,
            ttl: Duration::ZERO,
        }
    }

    /// Returns `true` if this configuration caches anything.
    pub fn is_enabled(&self) -> bool {
        self.max_entries > 0 && !self.ttl.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    tenant: TenantId,
    stream: StreamId,
    credential: Credential,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    metadata: StreamMetadata,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub size: usize,
    /// Number of evictions due to capacity or expiry.
    pub evictions: u64,
}

/// TTL cache of allowed decisions.
#[derive(Debug)]
pub struct DecisionCache {
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl DecisionCache {
    /// Create a new decision cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<StreamMetadata> {
        if !self.config.is_enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if let Some(entry) = self.entries.read().get(key) {
            if !entry.is_expired(self.config.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.metadata);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn insert(&self, key: CacheKey, metadata: StreamMetadata) {
        if !self.config.is_enabled() {
            return;
        }

        let mut entries = self.entries.write();

        if entries.len() >= self.config.max_entries {
            self.evict_expired(&mut entries);
        }

        while entries.len() >= self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }

        entries.insert(
            key,
            CacheEntry {
                metadata,
                created_at: Instant::now(),
            },
        );
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.read().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn evict_expired(&self, entries: &mut HashMap<CacheKey, CacheEntry>) {
        let ttl = self.config.ttl;
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired(ttl));
        let evicted = before - entries.len();
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }
}

/// Wraps any gateway with a [`DecisionCache`].
pub struct CachedAuthorizer {
    inner: Arc<dyn AuthorizationGateway>,
    cache: DecisionCache,
}

impl CachedAuthorizer {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn AuthorizationGateway>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: DecisionCache::new(config),
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Clear the decision cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for CachedAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAuthorizer")
            .field("inner", &self.inner.name())
            .field("cache", &self.cache)
            .finish()
    }
}

#[async_trait]
impl AuthorizationGateway for CachedAuthorizer {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn authorize(
        &self,
        tenant: &TenantId,
        stream: &StreamId,
        credential: Option<&Credential>,
    ) -> AuthzResult<StreamMetadata> {
        // Anonymous requests are always rejected downstream; nothing to cache.
        let Some(credential) = credential else {
            return self.inner.authorize(tenant, stream, None).await;
        };

        let key = CacheKey {
            tenant: tenant.clone(),
            stream: stream.clone(),
            credential: credential.clone(),
        };

        if let Some(metadata) = self.cache.get(&key) {
            tracing::debug!(tenant = %tenant, stream = %stream, cached = true, "returning cached decision");
            return Ok(metadata);
        }

        let metadata = self.inner.authorize(tenant, stream, Some(credential)).await?;
        self.cache.insert(key, metadata);
        Ok(metadata)
    }
}
