//! Key Builder Module
//!
//! Derives the store key from identity, optional freshness token and build
//! fingerprint.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::{CacheIdentity, FingerprintProvider, KEY_DELIMITER};

// == Cache Key ==
/// A derived store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Appends the freshness token (epoch millis) and a non-empty fingerprint.
pub fn compose_key(
    partial_key: &str,
    updated_at: Option<DateTime<Utc>>,
    fingerprint: &str,
) -> CacheKey {
    let mut key = partial_key.to_string();
    if let Some(updated_at) = updated_at {
        key.push_str(KEY_DELIMITER);
        key.push_str(&updated_at.timestamp_millis().to_string());
    }
    if !fingerprint.is_empty() {
        key.push_str(KEY_DELIMITER);
        key.push_str(fingerprint);
    }
    CacheKey(key)
}

/// Builds the cache key for `identity`.
///
/// The fingerprint provider is asked on every call; memoization is its job.
pub async fn build_key(
    identity: &CacheIdentity,
    updated_at: Option<DateTime<Utc>>,
    fingerprint: &dyn FingerprintProvider,
) -> Result<CacheKey> {
    let partial_key = identity.partial_key()?;
    let fingerprint = fingerprint.fingerprint().await?;
    Ok(compose_key(&partial_key, updated_at, &fingerprint))
}
