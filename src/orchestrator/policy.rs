//! Cache Policy
//!
//! Per-call caching options.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// How one `resolve` call caches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachePolicy {
    /// Seconds until expiry; falls back to the orchestrator default.
    /// Zero means no expiry.
    pub ttl: Option<u64>,
    /// Explicit bypass; unset means "bypass in development mode only"
    pub bypass: Option<bool>,
    /// Invalidation tags, attached when the store supports them
    pub tags: BTreeSet<String>,
    /// Freshness token folded into the key
    pub updated_at: Option<DateTime<Utc>>,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn bypass(mut self, bypass: bool) -> Self {
        self.bypass = Some(bypass);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}
