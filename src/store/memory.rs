//! In-Process Store Module
//!
//! Default KV backend: a map from key to payload with lazy TTL expiry, LRU
//! eviction at capacity and a tag index for bulk invalidation.
//!
//! Not shared across processes; run the KV service and point
//! [`RemoteStore`](crate::store::RemoteStore) at it for that.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{
    KvStore, RecencyOrder, StoreError, StoreResult, StoreStats, StoredEntry, TaggedStore,
    DEFAULT_MAX_ENTRIES, MAX_KEY_LENGTH, MAX_VALUE_SIZE,
};

// == Store State ==
/// Synchronous store core. Callers provide the locking.
#[derive(Debug)]
pub struct StoreState {
    entries: HashMap<String, StoredEntry>,
    order: RecencyOrder,
    tag_index: HashMap<String, HashSet<String>>,
    stats: StoreStats,
    max_entries: usize,
}

impl StoreState {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: RecencyOrder::new(),
            tag_index: HashMap::new(),
            stats: StoreStats::default(),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the live value for `key`. Expired entries are dropped and
    /// reported as absent.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.misses += 1;
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        self.order.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`, replacing any previous entry and its tags.
    pub fn set(
        &mut self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        tags: BTreeSet<String>,
    ) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::Rejected("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(StoreError::Rejected(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(StoreError::Rejected(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if self.remove_entry(key).is_none() && self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.order.pop_oldest() {
                self.remove_entry(&oldest);
                self.stats.evictions += 1;
            }
        }

        for tag in &tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.entries
            .insert(key.to_string(), StoredEntry::new(value, ttl, tags));
        self.order.touch(key);
        Ok(())
    }

    /// Removes `key`. Returns whether an entry existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes every entry carrying `tag`. Returns how many were removed.
    pub fn invalidate_tag(&mut self, tag: &str) -> usize {
        let keys = self.tag_index.remove(tag).unwrap_or_default();
        let removed = keys
            .iter()
            .filter(|key| self.remove_entry(key).is_some())
            .count();
        self.stats.invalidations += removed as u64;
        removed
    }

    /// Removes all expired entries. Returns how many were removed.
    pub fn sweep_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        expired.len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_entries: self.entries.len(),
            ..self.stats.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> Option<StoredEntry> {
        let entry = self.entries.remove(key)?;
        self.order.forget(key);
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        Some(entry)
    }
}

// == Memory Store ==
/// Async, lock-guarded wrapper over [`StoreState`]. Concurrent `set`s on the
/// same key serialize on the lock; the last one wins.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::new(max_entries)),
        }
    }

    pub async fn stats(&self) -> StoreStats {
        self.state.lock().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }

    /// Eagerly drops expired entries; see [`spawn_cleanup_task`](crate::tasks::spawn_cleanup_task).
    pub async fn sweep_expired(&self) -> usize {
        self.state.lock().await.sweep_expired()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.state.lock().await.get(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> StoreResult<()> {
        self.state.lock().await.set(key, value, ttl, BTreeSet::new())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.state.lock().await.delete(key))
    }

    fn as_tagged(&self) -> Option<&dyn TaggedStore> {
        Some(self)
    }
}

#[async_trait]
impl TaggedStore for MemoryStore {
    async fn set_tagged(
        &self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        tags: &BTreeSet<String>,
    ) -> StoreResult<()> {
        self.state.lock().await.set(key, value, ttl, tags.clone())
    }

    async fn invalidate_tag(&self, tag: &str) -> StoreResult<usize> {
        Ok(self.state.lock().await.invalidate_tag(tag))
    }
}
