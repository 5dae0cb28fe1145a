//! Stored Entry Module
//!
//! A single payload held by the in-process store, with lazy TTL expiry.

use std::collections::BTreeSet;

use chrono::Utc;

// == Stored Entry ==
/// Represents a single store entry with value and metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The stored payload
    pub value: String,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<i64>,
    /// Invalidation tags attached on write
    pub tags: BTreeSet<String>,
}

impl StoredEntry {
    /// Creates an entry. A TTL of zero or None never expires.
    pub fn new(value: String, ttl_seconds: Option<u64>, tags: BTreeSet<String>) -> Self {
        let expires_at = ttl_seconds
            .filter(|ttl| *ttl > 0)
            .map(|ttl| now_ms().saturating_add((ttl as i64).saturating_mul(1000)));

        Self {
            value,
            expires_at,
            tags,
        }
    }

    /// An entry is expired once the current time reaches its expiry timestamp.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires| now_ms() >= expires)
    }
}

/// Current Unix timestamp in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
