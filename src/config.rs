//! Configuration Module
//!
//! Handles loading render cache and KV service settings from environment variables.

use std::env;
use std::path::PathBuf;

/// Default location of the build fingerprint file.
pub const DEFAULT_BUILD_ID_FILE: &str = ".build/BUILD_ID";

// == Execution Mode ==
/// Whether the process runs as a development or production build.
///
/// Development mode bypasses the cache by default and recomputes the
/// fingerprint on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    Development,
    #[default]
    Production,
}

impl ExecutionMode {
    /// Parses `development`/`dev` and `production`/`prod`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Render cache and KV service configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Development or production behavior
    pub mode: ExecutionMode,
    /// Maximum number of entries the in-process store can hold
    pub max_entries: usize,
    /// TTL in seconds applied when a call does not name one (None = no expiry)
    pub default_ttl: Option<u64>,
    /// HTTP port of the KV service
    pub server_port: u16,
    /// Background sweep interval in seconds for the KV service
    pub cleanup_interval: u64,
    /// Explicit build fingerprint, wins over every other source
    pub build_id: Option<String>,
    /// File holding the build fingerprint
    pub build_id_file: PathBuf,
    /// Treat store read failures as misses and fall back to uncached output
    pub degrade_on_error: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RENDER_CACHE_MODE` (or `APP_ENV`) - `development` or `production` (default: production)
    /// - `MAX_ENTRIES` - Maximum store entries (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: none)
    /// - `SERVER_PORT` - KV service port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `BUILD_ID` - Explicit build fingerprint (default: none)
    /// - `BUILD_ID_FILE` - Fingerprint file (default: `.build/BUILD_ID`)
    /// - `DEGRADE_ON_ERROR` - `true`/`false` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mode: env::var("RENDER_CACHE_MODE")
                .or_else(|_| env::var("APP_ENV"))
                .ok()
                .and_then(|v| ExecutionMode::parse(&v))
                .unwrap_or(defaults.mode),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_var::<u64>("DEFAULT_TTL").filter(|ttl| *ttl > 0),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            build_id: env::var("BUILD_ID").ok().filter(|v| !v.trim().is_empty()),
            build_id_file: env::var("BUILD_ID_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.build_id_file),
            degrade_on_error: parse_var("DEGRADE_ON_ERROR").unwrap_or(defaults.degrade_on_error),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Production,
            max_entries: 1000,
            default_ttl: None,
            server_port: 3000,
            cleanup_interval: 1,
            build_id: None,
            build_id_file: PathBuf::from(DEFAULT_BUILD_ID_FILE),
            degrade_on_error: true,
        }
    }
}
