//! Build Fingerprint Module
//!
//! Providers for the per-process build/version string appended to every key.
//! Changing the fingerprint orphans every key derived from the previous one.

use std::env;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::{Config, ExecutionMode};
use crate::error::{CacheError, Result};

/// Environment variable holding a version-control commit fingerprint.
pub const COMMIT_SHA_VAR: &str = "GIT_COMMIT_SHA";

// == Provider Trait ==
/// Source of the running build's fingerprint.
///
/// Implementations that perform I/O should memoize their own result; the key
/// builder calls this on every key derivation.
#[async_trait]
pub trait FingerprintProvider: Send + Sync {
    async fn fingerprint(&self) -> Result<String>;
}

// == Static Fingerprint ==
/// A fixed fingerprint. An empty string adds no suffix to keys.
#[derive(Debug, Clone, Default)]
pub struct StaticFingerprint(String);

impl StaticFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[async_trait]
impl FingerprintProvider for StaticFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

// == Build Fingerprint ==
/// Resolves the build fingerprint from the environment or a build file.
///
/// Production resolves once per provider and memoizes the value: explicit
/// build id first, then the commit fingerprint, then the trimmed contents of
/// the build file. Development returns the current epoch milliseconds on
/// every call, so cached entries never outlive a code change.
#[derive(Debug)]
pub struct BuildFingerprint {
    mode: ExecutionMode,
    build_id: Option<String>,
    commit_sha: Option<String>,
    build_id_file: PathBuf,
    resolved: OnceCell<String>,
}

impl BuildFingerprint {
    pub fn new(mode: ExecutionMode, build_id_file: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            build_id: None,
            commit_sha: None,
            build_id_file: build_id_file.into(),
            resolved: OnceCell::new(),
        }
    }

    /// Builds a provider from configuration plus `GIT_COMMIT_SHA`.
    pub fn from_config(config: &Config) -> Self {
        let mut provider = Self::new(config.mode, config.build_id_file.clone());
        provider.build_id = config.build_id.clone();
        provider.commit_sha = env::var(COMMIT_SHA_VAR).ok().filter(|v| !v.trim().is_empty());
        provider
    }

    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }

    pub fn with_commit_sha(mut self, commit_sha: impl Into<String>) -> Self {
        self.commit_sha = Some(commit_sha.into());
        self
    }

    async fn resolve_production(&self) -> Result<String> {
        if let Some(build_id) = &self.build_id {
            return Ok(build_id.trim().to_string());
        }
        if let Some(commit_sha) = &self.commit_sha {
            return Ok(commit_sha.trim().to_string());
        }
        let contents = tokio::fs::read_to_string(&self.build_id_file)
            .await
            .map_err(|e| {
                CacheError::KeyDerivation(format!(
                    "cannot read build fingerprint from {}: {}",
                    self.build_id_file.display(),
                    e
                ))
            })?;
        Ok(contents.trim().to_string())
    }
}

#[async_trait]
impl FingerprintProvider for BuildFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        if self.mode.is_development() {
            return Ok(Utc::now().timestamp_millis().to_string());
        }

        let value = self
            .resolved
            .get_or_try_init(|| async {
                let value = self.resolve_production().await?;
                info!("Build fingerprint resolved: {:?}", value);
                Ok::<_, CacheError>(value)
            })
            .await?;
        Ok(value.clone())
    }
}
