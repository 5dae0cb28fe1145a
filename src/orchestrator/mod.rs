//! Cache Orchestrator Module
//!
//! Runs the fetch-or-populate protocol for one identity: derive the key,
//! consult the configured strategy and render only on a miss.
//!
//! Concurrent misses on one key are not coalesced. Both callers render and
//! both write; the last write wins.

mod policy;
mod strategy;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, info};

use crate::config::{Config, ExecutionMode};
use crate::error::{CacheError, Result};
use crate::key::{
    build_key, BuildFingerprint, CacheIdentity, CacheKey, FingerprintProvider, StaticFingerprint,
};
use crate::store::{KvStore, MemoryStore};
use crate::transcode::RenderPayload;

pub use policy::CachePolicy;
pub use strategy::{CacheFn, CacheStrategy, RenderThunk, StoreCache};

// == Orchestrator ==
#[derive(Clone)]
pub struct CacheOrchestrator {
    strategy: CacheStrategy,
    fingerprint: Arc<dyn FingerprintProvider>,
    mode: ExecutionMode,
    default_ttl: Option<u64>,
    degrade_on_error: bool,
}

impl CacheOrchestrator {
    pub fn builder() -> CacheOrchestratorBuilder {
        CacheOrchestratorBuilder::default()
    }

    /// An orchestrator over a fresh in-process store sized and tuned by
    /// `config`, fingerprinted with [`BuildFingerprint`].
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .config(config)
            .store(Arc::new(MemoryStore::new(config.max_entries)))
            .build()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn degrade_on_error(&self) -> bool {
        self.degrade_on_error
    }

    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Explicit bypass wins; otherwise only development mode bypasses.
    pub fn bypasses(&self, policy: &CachePolicy) -> bool {
        policy.bypass.unwrap_or_else(|| self.mode.is_development())
    }

    /// Derives the store key for `identity`.
    pub async fn cache_key(
        &self,
        identity: &CacheIdentity,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<CacheKey> {
        build_key(identity, updated_at, self.fingerprint.as_ref()).await
    }

    fn effective_ttl(&self, ttl: Option<u64>) -> Option<u64> {
        ttl.or(self.default_ttl).filter(|seconds| *seconds > 0)
    }

    /// Returns the cached payload for `identity`, rendering and storing it
    /// on a miss.
    ///
    /// A failed render is returned as is and never stored.
    pub async fn resolve<'a, F, Fut>(
        &'a self,
        identity: &'a CacheIdentity,
        policy: &'a CachePolicy,
        render: F,
    ) -> Result<RenderPayload>
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<RenderPayload>> + Send + 'a,
    {
        if self.bypasses(policy) {
            info!("Cache bypass: {}", identity.partial_key().unwrap_or_default());
            return render().await;
        }

        let key = self.cache_key(identity, policy.updated_at).await?;
        let ttl = self.effective_ttl(policy.ttl);
        let render: RenderThunk<'a> = Box::new(move || render().boxed());

        self.strategy
            .cache_fn()
            .fetch_or_populate(&key, ttl, &policy.tags, render)
            .await
    }

    /// Deletes the entry under `key`. Returns whether one existed.
    pub async fn purge(&self, key: &CacheKey) -> Result<bool> {
        let store = self.require_store("purge")?;
        let removed = store
            .delete(key.as_str())
            .await
            .map_err(|e| CacheError::StoreUnavailable(e.to_string()))?;
        debug!("Purged {} (existed: {})", key, removed);
        Ok(removed)
    }

    /// Purges the entry for `identity` under the current fingerprint.
    pub async fn revalidate(
        &self,
        identity: &CacheIdentity,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let key = self.cache_key(identity, updated_at).await?;
        self.purge(&key).await
    }

    /// Drops every entry tagged `tag`. Returns how many were removed.
    pub async fn invalidate_tag(&self, tag: &str) -> Result<usize> {
        let store = self.require_store("tag invalidation")?;
        let tagged = store.as_tagged().ok_or_else(|| {
            CacheError::Unsupported(format!("store {} has no tag support", store.name()))
        })?;
        let removed = tagged
            .invalidate_tag(tag)
            .await
            .map_err(|e| CacheError::StoreUnavailable(e.to_string()))?;
        info!("Invalidated tag {}: {} entries removed", tag, removed);
        Ok(removed)
    }

    fn require_store(&self, operation: &str) -> Result<&Arc<dyn KvStore>> {
        self.strategy.store().ok_or_else(|| {
            CacheError::Unsupported(format!("{} needs the store-backed strategy", operation))
        })
    }
}

impl std::fmt::Debug for CacheOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("strategy", &self.strategy)
            .field("mode", &self.mode)
            .field("default_ttl", &self.default_ttl)
            .field("degrade_on_error", &self.degrade_on_error)
            .finish()
    }
}

// == Builder ==
/// Binds strategy, fingerprint provider and defaults once.
pub struct CacheOrchestratorBuilder {
    store: Option<Arc<dyn KvStore>>,
    cache_fn: Option<Arc<dyn CacheFn>>,
    fingerprint: Arc<dyn FingerprintProvider>,
    mode: ExecutionMode,
    default_ttl: Option<u64>,
    degrade_on_error: bool,
}

impl Default for CacheOrchestratorBuilder {
    fn default() -> Self {
        Self {
            store: None,
            cache_fn: None,
            fingerprint: Arc::new(StaticFingerprint::default()),
            mode: ExecutionMode::default(),
            default_ttl: None,
            degrade_on_error: true,
        }
    }
}

impl CacheOrchestratorBuilder {
    /// Takes mode, default TTL, degrade policy and fingerprint from `config`.
    pub fn config(self, config: &Config) -> Self {
        self.mode(config.mode)
            .default_ttl(config.default_ttl)
            .degrade_on_error(config.degrade_on_error)
            .fingerprint(Arc::new(BuildFingerprint::from_config(config)))
    }

    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the store-backed protocol entirely.
    pub fn cache_fn(mut self, cache_fn: Arc<dyn CacheFn>) -> Self {
        self.cache_fn = Some(cache_fn);
        self
    }

    pub fn fingerprint(mut self, fingerprint: Arc<dyn FingerprintProvider>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn default_ttl(mut self, ttl: Option<u64>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn degrade_on_error(mut self, degrade: bool) -> Self {
        self.degrade_on_error = degrade;
        self
    }

    /// An override wins over a store; with neither, an in-process store
    /// with default capacity is used.
    pub fn build(self) -> CacheOrchestrator {
        let strategy = match (self.cache_fn, self.store) {
            (Some(cache_fn), _) => CacheStrategy::Override(cache_fn),
            (None, store) => {
                let store = store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
                CacheStrategy::Store(StoreCache::new(store).degrade_on_error(self.degrade_on_error))
            }
        };

        CacheOrchestrator {
            strategy,
            fingerprint: self.fingerprint,
            mode: self.mode,
            default_ttl: self.default_ttl,
            degrade_on_error: self.degrade_on_error,
        }
    }
}
