//! Cache Strategies
//!
//! The fetch-or-populate protocol behind [`CacheFn`], with the store-backed
//! default and room for a caller-supplied override.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::store::KvStore;
use crate::transcode::RenderPayload;

/// Deferred render, invoked at most once and only on a miss.
pub type RenderThunk<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<RenderPayload>> + Send + 'a>;

// == Cache Function ==
/// A fetch-or-populate protocol for one key.
///
/// Implementations must not write a payload when `render` fails.
#[async_trait]
pub trait CacheFn: Send + Sync {
    async fn fetch_or_populate<'a>(
        &self,
        key: &CacheKey,
        ttl: Option<u64>,
        tags: &BTreeSet<String>,
        render: RenderThunk<'a>,
    ) -> Result<RenderPayload>;
}

// == Store Cache ==
/// Store-backed protocol: read, render on miss, write back.
///
/// With `degrade_on_error`, a failed read counts as a miss; otherwise it is
/// returned as [`CacheError::StoreUnavailable`]. Failed writes are logged and
/// dropped either way.
#[derive(Clone)]
pub struct StoreCache {
    store: Arc<dyn KvStore>,
    degrade_on_error: bool,
}

impl StoreCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            degrade_on_error: true,
        }
    }

    pub fn degrade_on_error(mut self, degrade: bool) -> Self {
        self.degrade_on_error = degrade;
        self
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<String>> {
        match self.store.get(key.as_str()).await {
            Ok(value) => Ok(value),
            Err(err) if self.degrade_on_error => {
                warn!(
                    "Store {} read failed for {}, treating as miss: {}",
                    self.store.name(),
                    key,
                    err
                );
                Ok(None)
            }
            Err(err) => Err(CacheError::StoreUnavailable(err.to_string())),
        }
    }

    async fn write(
        &self,
        key: &CacheKey,
        payload: &RenderPayload,
        ttl: Option<u64>,
        tags: &BTreeSet<String>,
    ) {
        let value = payload.as_str().to_owned();
        let written = match self.store.as_tagged() {
            Some(tagged) if !tags.is_empty() => {
                tagged.set_tagged(key.as_str(), value, ttl, tags).await
            }
            _ => {
                if !tags.is_empty() {
                    debug!(
                        "Store {} has no tag support, tags for {} dropped",
                        self.store.name(),
                        key
                    );
                }
                self.store.set(key.as_str(), value, ttl).await
            }
        };

        if let Err(err) = written {
            warn!("Dropping cache write for {}: {}", key, err);
        }
    }
}

impl fmt::Debug for StoreCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCache")
            .field("store", &self.store.name())
            .field("degrade_on_error", &self.degrade_on_error)
            .finish()
    }
}

#[async_trait]
impl CacheFn for StoreCache {
    async fn fetch_or_populate<'a>(
        &self,
        key: &CacheKey,
        ttl: Option<u64>,
        tags: &BTreeSet<String>,
        render: RenderThunk<'a>,
    ) -> Result<RenderPayload> {
        if let Some(value) = self.read(key).await? {
            info!("Cache hit: {}", key);
            return Ok(RenderPayload::from(value));
        }

        info!("Cache miss: {}", key);
        let payload = render().await.map_err(|err| {
            error!("Render failed for {}: {}", key, err);
            err
        })?;

        self.write(key, &payload, ttl, tags).await;
        Ok(payload)
    }
}

// == Strategy ==
/// The protocol an orchestrator runs, chosen once at construction.
#[derive(Clone)]
pub enum CacheStrategy {
    Store(StoreCache),
    Override(Arc<dyn CacheFn>),
}

impl CacheStrategy {
    pub fn cache_fn(&self) -> &dyn CacheFn {
        match self {
            CacheStrategy::Store(store) => store,
            CacheStrategy::Override(cache_fn) => cache_fn.as_ref(),
        }
    }

    /// The backing store, for the store-backed strategy.
    pub fn store(&self) -> Option<&Arc<dyn KvStore>> {
        match self {
            CacheStrategy::Store(store) => Some(store.store()),
            CacheStrategy::Override(_) => None,
        }
    }
}

impl fmt::Debug for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Store(store) => f.debug_tuple("Store").field(store).finish(),
            CacheStrategy::Override(_) => f.write_str("Override"),
        }
    }
}
