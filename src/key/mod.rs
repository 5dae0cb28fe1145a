//! Key Module
//!
//! Stable cache-key derivation from caller identity and build fingerprint.

mod builder;
mod fingerprint;
mod identity;


pub use builder::{build_key, compose_key, CacheKey};
pub use fingerprint::{BuildFingerprint, FingerprintProvider, StaticFingerprint, COMMIT_SHA_VAR};
pub use identity::{CacheIdentity, Scalar, KEY_DELIMITER};
