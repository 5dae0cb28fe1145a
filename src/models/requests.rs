//! Request DTOs for the KV service
//!
//! Defines the structure of incoming HTTP request bodies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::store::MAX_KEY_LENGTH;

/// Request body for `PUT /set`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRequest {
    /// The store key
    pub key: String,
    /// The payload to store
    pub value: String,
    /// Optional TTL in seconds; absent or zero never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Invalidation tags attached to the entry
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl SetRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if self.tags.iter().any(|tag| tag.is_empty()) {
            return Some("Tags cannot be empty".to_string());
        }
        None
    }
}
