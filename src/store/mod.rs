//! Store Module
//!
//! The KV Store Interface consumed by the cache orchestrator, its default
//! in-process implementation and an HTTP client for the shared KV service.

mod entry;
mod lru;
mod memory;
mod remote;
mod stats;


use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

pub use entry::{now_ms, StoredEntry};
pub use lru::RecencyOrder;
pub use memory::{MemoryStore, StoreState};
pub use remote::RemoteStore;
pub use stats::StoreStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Maximum allowed payload size in bytes
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024;

/// Capacity of [`MemoryStore::default`]
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// == Store Error ==
/// Backend failure. A missing key is `Ok(None)`, never an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Backend unreachable or answering with a failure
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the key or value
    #[error("rejected by backend: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == KV Store Interface ==
/// Minimal get/set-with-TTL contract.
///
/// A TTL of `None` (or zero) means the entry does not expire through this
/// mechanism. Implementations must tolerate concurrent access to one key;
/// the last `set` wins.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// A name for logging, e.g. "memory" or "remote".
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> StoreResult<()>;

    /// Removes `key`. Returns whether an entry existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Tag support, when the backend offers it.
    fn as_tagged(&self) -> Option<&dyn TaggedStore> {
        None
    }
}

/// Stores that can attach tags on write and drop every entry under a tag.
#[async_trait]
pub trait TaggedStore: Send + Sync {
    async fn set_tagged(
        &self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        tags: &BTreeSet<String>,
    ) -> StoreResult<()>;

    /// Removes every entry tagged `tag`. Returns how many were removed.
    async fn invalidate_tag(&self, tag: &str) -> StoreResult<usize>;
}
