//! Cache Component
//!
//! Caches the rendered payload of an expensive subtree under a caller
//! supplied identity.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::component::CacheClient;
use crate::config::ExecutionMode;
use crate::error::Result;
use crate::key::CacheIdentity;
use crate::orchestrator::{CacheOrchestrator, CachePolicy};
use crate::transcode::{render_to_payload, DecodeMode, Element, Manifests, Node, RenderPayload};

// == Renderer ==
/// Turns a tree into a fully drained payload. Must not cache on its own.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, tree: &Node) -> Result<RenderPayload>;
}

/// Renders by encoding against the frozen client manifest.
#[derive(Debug, Clone, Default)]
pub struct PayloadRenderer {
    manifests: Manifests,
}

impl PayloadRenderer {
    pub fn new(manifests: Manifests) -> Self {
        Self { manifests }
    }
}

#[async_trait]
impl Renderer for PayloadRenderer {
    async fn render(&self, tree: &Node) -> Result<RenderPayload> {
        Ok(render_to_payload(tree, &self.manifests.client).await?)
    }
}

// == Props ==
/// Options of one cached subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheProps {
    pub id: CacheIdentity,
    pub ttl: Option<u64>,
    /// Skip caching in development mode; unset means skip
    pub bypass_in_dev: Option<bool>,
    /// Emit the raw payload instead of the tree
    pub debug: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: BTreeSet<String>,
}

impl CacheProps {
    pub fn new(id: impl Into<CacheIdentity>) -> Self {
        Self {
            id: id.into(),
            ttl: None,
            bypass_in_dev: None,
            debug: false,
            updated_at: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn bypass_in_dev(mut self, bypass: bool) -> Self {
        self.bypass_in_dev = Some(bypass);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// The orchestrator policy for these props. `bypass_in_dev` only ever
    /// bypasses in development mode.
    pub fn policy(&self, mode: ExecutionMode) -> CachePolicy {
        CachePolicy {
            ttl: self.ttl,
            bypass: self
                .bypass_in_dev
                .map(|bypass| bypass && mode.is_development()),
            tags: self.tags.clone(),
            updated_at: self.updated_at,
        }
    }
}

// == Output ==
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutput {
    /// Children rendered directly, nothing cached
    Uncached(Node),
    /// Debug output: the payload itself
    Raw(RenderPayload),
    /// Payload to hand to a [`CacheClient`](crate::component::CacheClient)
    Payload(RenderPayload),
}

impl CacheOutput {
    pub fn payload(&self) -> Option<&RenderPayload> {
        match self {
            CacheOutput::Uncached(_) => None,
            CacheOutput::Raw(payload) | CacheOutput::Payload(payload) => Some(payload),
        }
    }

    /// Resolves the output to a tree, decoding payloads with `mode`.
    pub async fn into_tree(self, mode: DecodeMode) -> Result<Node> {
        match self {
            CacheOutput::Uncached(tree) => Ok(tree),
            CacheOutput::Raw(payload) => Ok(raw_payload_node(&payload)),
            CacheOutput::Payload(payload) => CacheClient::new(payload, mode).tree().await,
        }
    }
}

/// Presents a raw payload as preformatted text.
pub fn raw_payload_node(payload: &RenderPayload) -> Node {
    Element::new("pre")
        .attr("data-cache", "raw")
        .child(Node::text(payload.as_str()))
        .into()
}

// == Cache ==
/// Cached subtree renderer bound to one orchestrator and renderer.
#[derive(Clone)]
pub struct Cache {
    orchestrator: CacheOrchestrator,
    renderer: Arc<dyn Renderer>,
}

impl Cache {
    pub fn new(orchestrator: CacheOrchestrator, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            orchestrator,
            renderer,
        }
    }

    /// A cache that renders through [`PayloadRenderer`].
    pub fn with_manifests(orchestrator: CacheOrchestrator, manifests: Manifests) -> Self {
        Self::new(orchestrator, Arc::new(PayloadRenderer::new(manifests)))
    }

    pub fn orchestrator(&self) -> &CacheOrchestrator {
        &self.orchestrator
    }

    /// Renders `children` through the cache.
    ///
    /// `children` is only called on a miss, on bypass, or when a cache-layer
    /// failure degrades to uncached output. Render failures are returned.
    pub async fn render<F, Fut>(&self, props: &CacheProps, children: F) -> Result<CacheOutput>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<Node>> + Send,
    {
        let policy = props.policy(self.orchestrator.mode());
        if self.orchestrator.bypasses(&policy) {
            return Ok(CacheOutput::Uncached(children().await?));
        }

        let children = &children;
        let renderer = &self.renderer;
        let cached = self
            .orchestrator
            .resolve(&props.id, &policy, move || async move {
                let tree = children().await?;
                renderer.render(&tree).await
            })
            .await;

        match cached {
            Ok(payload) if props.debug => Ok(CacheOutput::Raw(payload)),
            Ok(payload) => Ok(CacheOutput::Payload(payload)),
            Err(err) if err.is_cache_layer() && self.orchestrator.degrade_on_error() => {
                warn!("Cache unavailable, rendering uncached: {}", err);
                Ok(CacheOutput::Uncached(children().await?))
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::CacheError;
    use crate::key::CacheKey;
    use crate::orchestrator::{CacheFn, RenderThunk};
    use crate::store::MemoryStore;

    fn greeting() -> Node {
        Element::new("p").child("Hello, this is a cached server component.").into()
    }

    async fn counted_tree(renders: &AtomicUsize) -> Result<Node> {
        renders.fetch_add(1, Ordering::SeqCst);
        Ok(greeting())
    }

    fn cache(mode: ExecutionMode) -> Cache {
        let orchestrator = CacheOrchestrator::builder()
            .store(Arc::new(MemoryStore::default()))
            .mode(mode)
            .build();
        Cache::with_manifests(orchestrator, Manifests::default())
    }

    #[test]
    fn test_props_policy() {
        let props = CacheProps::new("x").ttl(60).tag("posts").bypass_in_dev(true);
        let policy = props.policy(ExecutionMode::Production);
        assert_eq!(policy.ttl, Some(60));
        assert_eq!(policy.bypass, Some(false));
        assert!(policy.tags.contains("posts"));

        assert_eq!(props.policy(ExecutionMode::Development).bypass, Some(true));
        assert_eq!(CacheProps::new("x").policy(ExecutionMode::Development).bypass, None);
    }

    #[tokio::test]
    async fn test_second_render_is_a_hit() {
        let cache = cache(ExecutionMode::Production);
        let renders = AtomicUsize::new(0);
        let props = CacheProps::new("greeting").ttl(60);

        let first = cache.render(&props, || counted_tree(&renders)).await.unwrap();
        let second = cache.render(&props, || counted_tree(&renders)).await.unwrap();

        assert!(matches!(first, CacheOutput::Payload(_)));
        assert_eq!(first, second);
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_development_renders_uncached() {
        let cache = cache(ExecutionMode::Development);
        let renders = AtomicUsize::new(0);

        let output = cache
            .render(&CacheProps::new("greeting"), || counted_tree(&renders))
            .await
            .unwrap();
        assert_eq!(output, CacheOutput::Uncached(greeting()));

        let output = cache
            .render(&CacheProps::new("greeting").bypass_in_dev(false), || {
                counted_tree(&renders)
            })
            .await
            .unwrap();
        assert!(matches!(output, CacheOutput::Payload(_)));
    }

    #[tokio::test]
    async fn test_debug_emits_raw_payload() {
        let cache = cache(ExecutionMode::Production);
        let renders = AtomicUsize::new(0);

        let output = cache
            .render(&CacheProps::new("greeting").debug(true), || counted_tree(&renders))
            .await
            .unwrap();
        let payload = match output {
            CacheOutput::Raw(payload) => payload,
            other => panic!("expected raw output, got {:?}", other),
        };
        assert!(payload.as_str().starts_with("0:J"));
        assert!(raw_payload_node(&payload).to_html().starts_with("<pre data-cache=\"raw\">"));
    }

    #[tokio::test]
    async fn test_render_failure_is_returned() {
        let cache = cache(ExecutionMode::Production);
        let result = cache
            .render(&CacheProps::new("greeting"), || async {
                Err(CacheError::Render("query failed".to_string()))
            })
            .await;
        assert_eq!(result, Err(CacheError::Render("query failed".to_string())));
    }

    struct Offline;

    #[async_trait]
    impl CacheFn for Offline {
        async fn fetch_or_populate<'a>(
            &self,
            _key: &CacheKey,
            _ttl: Option<u64>,
            _tags: &BTreeSet<String>,
            _render: RenderThunk<'a>,
        ) -> Result<RenderPayload> {
            Err(CacheError::StoreUnavailable("kv offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cache_failure_degrades_to_uncached() {
        let renders = AtomicUsize::new(0);
        let degrading = Cache::with_manifests(
            CacheOrchestrator::builder().cache_fn(Arc::new(Offline)).build(),
            Manifests::default(),
        );
        let output = degrading
            .render(&CacheProps::new("greeting"), || counted_tree(&renders))
            .await
            .unwrap();
        assert_eq!(output, CacheOutput::Uncached(greeting()));

        let strict = Cache::with_manifests(
            CacheOrchestrator::builder()
                .cache_fn(Arc::new(Offline))
                .degrade_on_error(false)
                .build(),
            Manifests::default(),
        );
        let result = strict
            .render(&CacheProps::new("greeting"), || counted_tree(&renders))
            .await;
        assert!(matches!(result, Err(CacheError::StoreUnavailable(_))));
    }
}
