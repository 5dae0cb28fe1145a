//! Remote Store Module
//!
//! KV Store Interface over the HTTP KV service, so several processes can share
//! one backend.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::models::{ErrorResponse, GetResponse, InvalidateResponse, SetRequest};
use crate::store::{KvStore, StoreError, StoreResult, TaggedStore};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// == Remote Store ==
/// HTTP client for the KV service started by the `render_cache` binary.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: Url,
}

impl RemoteStore {
    /// Creates a client for the service at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> StoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "base url {} cannot carry a path",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Joins percent-encoded path segments onto the base url.
    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        for segment in segments {
            addressable(segment)?;
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn write(&self, request: &SetRequest) -> StoreResult<()> {
        addressable(&request.key)?;
        for tag in &request.tags {
            addressable(tag)?;
        }
        let response = self
            .client
            .put(self.endpoint(&["set"])?)
            .json(request)
            .send()
            .await
            .map_err(unavailable)?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(failure(response).await)
    }
}

/// URL paths normalize `.` and `..` away, so such keys and tags could be
/// written but never read back or invalidated.
fn addressable(segment: &str) -> StoreResult<()> {
    if matches!(segment, "." | "..") {
        return Err(StoreError::Rejected(format!(
            "{:?} cannot be addressed over HTTP",
            segment
        )));
    }
    Ok(())
}

fn unavailable(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Maps a non-success response: 4xx means the service refused the input.
async fn failure(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());

    if status.is_client_error() {
        StoreError::Rejected(message)
    } else {
        StoreError::Unavailable(message)
    }
}

#[async_trait]
impl KvStore for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let response = self
            .client
            .get(self.endpoint(&["get", key])?)
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: GetResponse = response.json().await.map_err(unavailable)?;
                Ok(Some(body.value))
            }
            _ => Err(failure(response).await),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> StoreResult<()> {
        self.write(&SetRequest {
            key: key.to_string(),
            value,
            ttl,
            tags: BTreeSet::new(),
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let response = self
            .client
            .delete(self.endpoint(&["del", key])?)
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(failure(response).await),
        }
    }

    fn as_tagged(&self) -> Option<&dyn TaggedStore> {
        Some(self)
    }
}

#[async_trait]
impl TaggedStore for RemoteStore {
    async fn set_tagged(
        &self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        tags: &BTreeSet<String>,
    ) -> StoreResult<()> {
        self.write(&SetRequest {
            key: key.to_string(),
            value,
            ttl,
            tags: tags.clone(),
        })
        .await
    }

    async fn invalidate_tag(&self, tag: &str) -> StoreResult<usize> {
        let response = self
            .client
            .post(self.endpoint(&["tags", tag, "invalidate"])?)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        let body: InvalidateResponse = response.json().await.map_err(unavailable)?;
        Ok(body.removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let store = RemoteStore::new("http://127.0.0.1:3000/").unwrap();
        let url = store.endpoint(&["get", "post/7 draft-b1"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/get/post%2F7%20draft-b1");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let store = RemoteStore::new("http://kv.internal/cache").unwrap();
        let url = store.endpoint(&["tags", "posts", "invalidate"]).unwrap();
        assert_eq!(url.as_str(), "http://kv.internal/cache/tags/posts/invalidate");
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        let store = RemoteStore::new("http://127.0.0.1:3000").unwrap();
        for segment in [".", ".."] {
            assert!(matches!(
                store.endpoint(&["get", segment]),
                Err(StoreError::Rejected(_))
            ));
        }
        assert!(store.endpoint(&["get", "..post"]).is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            RemoteStore::new("not a url"),
            Err(StoreError::Unavailable(_))
        ));
        assert!(RemoteStore::new("mailto:kv@example.com").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Port 9 (discard) is not expected to run an HTTP server
        let store = RemoteStore::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            store.get("anything").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
