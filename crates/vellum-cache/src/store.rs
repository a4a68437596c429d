//! Two-tier cache store

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vellum_permissions::Role;

use crate::config::{CacheConfig, TtlCategory, MAX_TTL_SECS};
use crate::error::{CacheError, Result};
use crate::key::{wildcard_match, CacheKey};
use crate::metrics::{CacheMetrics, CacheStats};
use crate::storage::{CacheEntry, CacheStorage, DiskStorage, MemoryStorage};

/// Cache of serialized responses
///
/// Every value lives in the bounded in-process map. When an external
/// [`CacheStorage`] is attached, writes go to both tiers and reads consult the
/// external tier first. External failures are logged and the memory tier
/// answers instead.
///
/// When a removal fails on the external tier, keys covered by the failed
/// pattern are read from memory only until every entry the external tier
/// may still hold for them has expired.
pub struct CacheStore {
    memory: MemoryStorage,
    external: Option<Arc<dyn CacheStorage>>,
    config: CacheConfig,
    metrics: CacheMetrics,
    /// Patterns whose external removal failed, with the instant after which
    /// nothing they cover can still be live there
    stale_external: RwLock<Vec<(String, Instant)>>,
    /// Longest TTL written so far, in seconds
    longest_ttl_secs: AtomicU64,
}

impl CacheStore {
    /// Create a store from configuration
    ///
    /// A `disk_path` in the configuration attaches a [`DiskStorage`] tier.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> CacheStoreBuilder {
        CacheStoreBuilder::new()
    }

    /// Attach an external storage tier
    pub fn with_external_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.external = Some(storage);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Retrieve a value
    ///
    /// Returns `Ok(None)` for missing, expired or undecodable entries.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if let Some(external) = self.readable_external(key).await {
            match external.get(key).await {
                Ok(Some(entry)) if !entry.is_expired() => {
                    if let Some(value) = self.decode(entry) {
                        self.metrics.record_hit();
                        debug!(key, tier = external.name(), "cache hit");
                        return Ok(Some(value));
                    }
                }
                Ok(Some(_)) => {
                    if let Err(e) = external.remove(key).await {
                        self.degraded("remove expired", external.name(), &e);
                    }
                }
                Ok(None) => {}
                Err(e) => self.degraded("get", external.name(), &e),
            }
        }

        match self.memory.get(key).await? {
            Some(entry) if entry.is_expired() => {
                self.memory.remove(key).await?;
                self.metrics.record_expirations(1);
            }
            Some(entry) => {
                if let Some(value) = self.decode(entry) {
                    self.metrics.record_hit();
                    debug!(key, tier = "memory", "cache hit");
                    return Ok(Some(value));
                }
                self.memory.remove(key).await?;
            }
            None => {}
        }

        self.metrics.record_miss();
        debug!(key, "cache miss");
        Ok(None)
    }

    /// Store a value with the TTL of its category
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        category: TtlCategory,
    ) -> Result<()> {
        self.set_with_ttl(key, value, self.config.ttl.for_category(category))
            .await
    }

    /// Store a value with an explicit TTL
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;
        let entry = CacheEntry::new(key, json, ttl);
        let ttl_secs = ttl.min(Duration::from_secs(MAX_TTL_SECS)).as_secs() + 1;
        self.longest_ttl_secs.fetch_max(ttl_secs, Ordering::Relaxed);

        if let Some(external) = &self.external {
            if let Err(e) = external.set(entry.clone()).await {
                self.degraded("set", external.name(), &e);
            }
        }

        let evicted = self.memory.insert(entry).await;
        if evicted > 0 {
            debug!(evicted, "cache overflow eviction");
            self.metrics.record_evictions(evicted);
        }
        self.metrics.record_store();
        Ok(())
    }

    /// Remove a single key
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut removed = self.memory.remove(key).await?;
        if let Some(external) = &self.external {
            match external.remove(key).await {
                Ok(hit) => removed |= hit,
                Err(e) => {
                    self.degraded("remove", external.name(), &e);
                    self.mark_external_stale(key).await;
                }
            }
        }
        if removed {
            self.metrics.record_invalidations(1);
        }
        Ok(removed)
    }

    /// Remove every key matching a `*` pattern
    ///
    /// # Returns
    /// Distinct entries removed. Entries live in both tiers, so this is the
    /// larger of the two per-tier counts.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut removed = self.memory.remove_matching(pattern).await?;
        if let Some(external) = &self.external {
            match external.remove_matching(pattern).await {
                Ok(count) => removed = removed.max(count),
                Err(e) => {
                    self.degraded("remove_matching", external.name(), &e);
                    self.mark_external_stale(pattern).await;
                }
            }
        }
        self.metrics.record_invalidations(removed);
        Ok(removed)
    }

    /// Drop everything cached for a path, its descendants and its ancestors
    ///
    /// Ancestors go too because their listings aggregate this path's entries.
    pub async fn invalidate_path(&self, path: &str) -> Result<usize> {
        let mut removed = 0;
        for pattern in CacheKey::path_invalidation_patterns(path) {
            removed += self.delete_pattern(&pattern).await?;
        }
        debug!(path, removed, "invalidated path");
        Ok(removed)
    }

    /// Drop everything cached for a role
    pub async fn invalidate_role(&self, role: Role) -> Result<usize> {
        let removed = self.delete_pattern(&CacheKey::role_pattern(role)).await?;
        debug!(%role, removed, "invalidated role");
        Ok(removed)
    }

    /// Remove expired entries from both tiers
    pub async fn purge_expired(&self) -> Result<usize> {
        let mut purged = self.memory.purge_expired().await?;
        if let Some(external) = &self.external {
            match external.purge_expired().await {
                Ok(count) => purged = purged.max(count),
                Err(e) => self.degraded("purge_expired", external.name(), &e),
            }
        }
        self.metrics.record_expirations(purged);
        Ok(purged)
    }

    pub async fn clear(&self) -> Result<()> {
        self.memory.clear().await?;
        if let Some(external) = &self.external {
            if let Err(e) = external.clear().await {
                self.degraded("clear", external.name(), &e);
                self.mark_external_stale("*").await;
            }
        }
        Ok(())
    }

    /// Entries held in memory, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.memory.len().await.unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len().await)
    }

    /// Start the background TTL sweep
    ///
    /// The task holds only a weak reference and exits once the store is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("cache dropped, sweeper exiting");
                    break;
                };
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "swept expired cache entries"),
                    Err(e) => warn!(error = %e, "cache sweep failed"),
                }
            }
        })
    }

    fn decode<T: DeserializeOwned>(&self, entry: CacheEntry) -> Option<T> {
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %entry.key, error = %e, "undecodable cache entry treated as miss");
                self.metrics.record_error();
                None
            }
        }
    }

    /// The external tier, unless `key` is covered by a failed removal
    async fn readable_external(&self, key: &str) -> Option<&Arc<dyn CacheStorage>> {
        let external = self.external.as_ref()?;
        let now = Instant::now();
        let stale = self
            .stale_external
            .read()
            .await
            .iter()
            .any(|(pattern, until)| *until > now && wildcard_match(pattern, key));
        if stale {
            debug!(key, tier = external.name(), "external tier may hold a removed entry, reading memory");
            return None;
        }
        Some(external)
    }

    async fn mark_external_stale(&self, pattern: &str) {
        let longest = Duration::from_secs(self.longest_ttl_secs.load(Ordering::Relaxed))
            .max(self.config.ttl.longest());
        let now = Instant::now();
        let mut stale = self.stale_external.write().await;
        stale.retain(|(_, until)| *until > now);
        stale.push((pattern.to_string(), now + longest));
    }

    fn degraded(&self, operation: &str, tier: &str, error: &CacheError) {
        warn!(operation, tier, error = %error, "external cache tier failed, using memory");
        self.metrics.record_error();
    }
}

/// Builder for [`CacheStore`]
#[derive(Default)]
pub struct CacheStoreBuilder {
    config: CacheConfig,
    external: Option<Arc<dyn CacheStorage>>,
}

impl CacheStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cache configuration
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the external storage tier, overriding any `disk_path`
    pub fn external_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.external = Some(storage);
        self
    }

    /// Validate the configuration and build the store
    pub fn build(self) -> Result<CacheStore> {
        self.config.validate()?;

        let external = match (self.external, &self.config.disk_path) {
            (Some(storage), _) => Some(storage),
            (None, Some(path)) => Some(Arc::new(DiskStorage::new(path)) as Arc<dyn CacheStorage>),
            (None, None) => None,
        };

        Ok(CacheStore {
            memory: MemoryStorage::new(self.config.max_entries, self.config.eviction_batch()),
            external,
            metrics: CacheMetrics::new(),
            stale_external: RwLock::new(Vec::new()),
            longest_ttl_secs: AtomicU64::new(0),
            config: self.config,
        })
    }
}
