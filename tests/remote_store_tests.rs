//! Integration Tests for the Remote Store
//!
//! Runs the KV service on a local port and drives it through `RemoteStore`,
//! directly and as the backend of a cache orchestrator.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use render_cache::api::create_router;
use render_cache::key::StaticFingerprint;
use render_cache::store::{StoreError, TaggedStore};
use render_cache::{
    AppState, CacheIdentity, CacheOrchestrator, CachePolicy, KvStore, MemoryStore, RemoteStore,
    RenderPayload,
};

// == Helper Functions ==

async fn spawn_service() -> (SocketAddr, AppState) {
    let state = AppState::new(MemoryStore::new(100));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn remote() -> (RemoteStore, AppState) {
    let (addr, state) = spawn_service().await;
    let store = RemoteStore::new(&format!("http://{}", addr)).unwrap();
    (store, state)
}

// == KV Contract ==

#[tokio::test]
async fn test_set_get_delete_roundtrip() {
    let (store, _) = remote().await;

    assert_eq!(store.get("post-1-b1").await, Ok(None));
    store
        .set("post-1-b1", "0:J{\"t\":\"text\",\"v\":\"hi\"}\n".to_string(), Some(60))
        .await
        .unwrap();
    assert_eq!(
        store.get("post-1-b1").await.unwrap().as_deref(),
        Some("0:J{\"t\":\"text\",\"v\":\"hi\"}\n")
    );

    assert_eq!(store.delete("post-1-b1").await, Ok(true));
    assert_eq!(store.delete("post-1-b1").await, Ok(false));
    assert_eq!(store.get("post-1-b1").await, Ok(None));
}

#[tokio::test]
async fn test_keys_with_reserved_characters() {
    let (store, state) = remote().await;
    let key = "post/7 draft?x=1#frag-b1";

    store.set(key, "payload".to_string(), None).await.unwrap();
    assert_eq!(store.get(key).await.unwrap().as_deref(), Some("payload"));
    assert_eq!(state.store.get(key).await.unwrap().as_deref(), Some("payload"));
}

#[tokio::test]
async fn test_tagged_writes_and_invalidation() {
    let (store, state) = remote().await;
    let posts: BTreeSet<String> = ["posts".to_string()].into();
    let nav: BTreeSet<String> = ["nav".to_string()].into();

    store.set_tagged("a", "1".to_string(), None, &posts).await.unwrap();
    store.set_tagged("b", "2".to_string(), None, &posts).await.unwrap();
    store.set_tagged("c", "3".to_string(), None, &nav).await.unwrap();

    assert_eq!(store.invalidate_tag("posts").await, Ok(2));
    assert_eq!(store.get("a").await, Ok(None));
    assert_eq!(store.get("c").await.unwrap().as_deref(), Some("3"));
    assert_eq!(state.store.len().await, 1);
}

#[tokio::test]
async fn test_rejected_write_is_not_an_outage() {
    let (store, _) = remote().await;
    let result = store.set("", "value".to_string(), None).await;
    assert!(matches!(result, Err(StoreError::Rejected(_))));
}

#[tokio::test]
async fn test_large_payload_roundtrip() {
    let (store, _) = remote().await;
    // 3 MiB of quotes, which JSON escaping grows past 5 MiB on the wire
    let value = "\"x\"".repeat(1 << 20);

    store.set("big-b1", value.clone(), None).await.unwrap();
    assert_eq!(store.get("big-b1").await.unwrap(), Some(value));
}

#[tokio::test]
async fn test_dot_keys_and_tags_are_rejected() {
    let (store, state) = remote().await;
    let dot: BTreeSet<String> = [".".to_string()].into();

    for key in [".", ".."] {
        assert!(matches!(
            store.set(key, "v".to_string(), None).await,
            Err(StoreError::Rejected(_))
        ));
        assert!(matches!(store.get(key).await, Err(StoreError::Rejected(_))));
    }
    assert!(matches!(
        store.set_tagged("a", "1".to_string(), None, &dot).await,
        Err(StoreError::Rejected(_))
    ));
    assert!(matches!(
        store.invalidate_tag("..").await,
        Err(StoreError::Rejected(_))
    ));
    assert!(state.store.is_empty().await);
}

// == Orchestrator over the Service ==

#[tokio::test]
async fn test_processes_share_cached_payloads() {
    let (addr, _) = spawn_service().await;
    let renders = &AtomicUsize::new(0);
    let id = CacheIdentity::from("shared");
    let policy = CachePolicy::new().ttl(60).tag("posts");

    // Two orchestrators stand in for two processes
    for _ in 0..2 {
        let store = RemoteStore::new(&format!("http://{}", addr)).unwrap();
        let cache = CacheOrchestrator::builder()
            .store(Arc::new(store))
            .fingerprint(Arc::new(StaticFingerprint::new("b1")))
            .build();

        let payload = cache
            .resolve(&id, &policy, move || async move {
                renders.fetch_add(1, Ordering::SeqCst);
                Ok(RenderPayload::from("0:J{\"t\":\"text\",\"v\":\"shared\"}\n".to_string()))
            })
            .await
            .unwrap();
        assert!(payload.as_str().contains("shared"));
    }

    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_service_degrades_to_render() {
    // Nothing listens on the discard port
    let store = RemoteStore::new("http://127.0.0.1:9").unwrap();
    let cache = CacheOrchestrator::builder()
        .store(Arc::new(store))
        .build();

    let payload = cache
        .resolve(&CacheIdentity::from("x"), &CachePolicy::new(), || async {
            Ok(RenderPayload::from("fresh".to_string()))
        })
        .await;
    assert_eq!(payload, Ok(RenderPayload::from("fresh".to_string())));
}
