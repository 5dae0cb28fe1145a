//! Error types for the render cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::transcode::TranscodeError;

// == Cache Error Enum ==
/// Unified error type for the render cache.
///
/// Every variant carries owned strings so the same error can be handed to
/// each waiter of a settled [`Deferred`](crate::deferred::Deferred).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Identity empty or malformed; never cached
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// KV backend unreachable or refusing the operation
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The renderer failed to produce a payload
    #[error("Render failed: {0}")]
    Render(String),

    /// Payload could not be encoded or decoded
    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    /// A pending deferred value was cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Key not found in the store
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation not offered by the configured backend
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// True for failures raised by the cache layer rather than by rendering.
    pub fn is_cache_layer(&self) -> bool {
        matches!(
            self,
            CacheError::StoreUnavailable(_) | CacheError::Unsupported(_) | CacheError::Internal(_)
        )
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(msg) => CacheError::InvalidRequest(msg),
            other => CacheError::StoreUnavailable(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::KeyDerivation(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the render cache.
pub type Result<T> = std::result::Result<T, CacheError>;
