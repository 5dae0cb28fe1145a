//! Cache Boundary
//!
//! Contains failures of one cached subtree so they do not take down the
//! surrounding response.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::error;

use crate::error::{CacheError, Result};
use crate::transcode::{DecodeMode, Element, Node};

/// Value of the `data-action` attribute on the fallback's retry button.
pub const RESET_ACTION: &str = "reset";

/// Where a tree is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSide {
    Server,
    Client,
}

impl From<&DecodeMode> for RenderSide {
    fn from(mode: &DecodeMode) -> Self {
        if mode.is_server() {
            RenderSide::Server
        } else {
            RenderSide::Client
        }
    }
}

impl fmt::Display for RenderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderSide::Server => f.write_str("server-render"),
            RenderSide::Client => f.write_str("client-render"),
        }
    }
}

pub type FallbackFn = Arc<dyn Fn(&CacheError) -> Node + Send + Sync>;

/// Error message plus a reset button.
pub fn default_fallback(err: &CacheError) -> Node {
    Element::new("div")
        .attr("role", "alert")
        .child(Element::new("p").child("Something went wrong:"))
        .child(Element::new("pre").child(Node::text(err.to_string())))
        .child(
            Element::new("button")
                .attr("data-action", RESET_ACTION)
                .child("Try again"),
        )
        .into()
}

// == Boundary ==
/// Renders a subtree or, if it fails, a fallback.
///
/// Holds no error state: resetting is rendering the subtree again.
#[derive(Clone)]
pub struct CacheBoundary {
    side: RenderSide,
    fallback: Option<FallbackFn>,
}

impl CacheBoundary {
    pub fn new(side: RenderSide) -> Self {
        Self {
            side,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackFn) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn render<Fut>(&self, subtree: Fut) -> Node
    where
        Fut: Future<Output = Result<Node>>,
    {
        match subtree.await {
            Ok(tree) => tree,
            Err(err) => {
                error!("Cached subtree failed during {}: {}", self.side, err);
                self.fallback_for(&err)
            }
        }
    }

    pub fn fallback_for(&self, err: &CacheError) -> Node {
        match &self.fallback {
            Some(fallback) => fallback(err),
            None => default_fallback(err),
        }
    }
}

impl fmt::Debug for CacheBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBoundary")
            .field("side", &self.side)
            .field("custom_fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::TranscodeError;

    #[tokio::test]
    async fn test_success_passes_through() {
        let boundary = CacheBoundary::new(RenderSide::Server);
        let tree = boundary.render(async { Ok(Node::text("fine")) }).await;
        assert_eq!(tree, Node::text("fine"));
    }

    #[tokio::test]
    async fn test_failure_renders_message_and_reset() {
        let boundary = CacheBoundary::new(RenderSide::Client);
        let html = boundary
            .render(async { Err(CacheError::Transcode(TranscodeError::Truncated)) })
            .await
            .to_html();

        assert!(html.contains("payload stream ended"));
        assert!(html.contains(r#"<button data-action="reset">Try again</button>"#));
    }

    #[tokio::test]
    async fn test_custom_fallback() {
        let boundary = CacheBoundary::new(RenderSide::Server)
            .with_fallback(Arc::new(|_: &CacheError| Node::text("unavailable")));
        let tree = boundary
            .render(async { Err(CacheError::Render("boom".to_string())) })
            .await;
        assert_eq!(tree, Node::text("unavailable"));
    }

    #[test]
    fn test_side_labels() {
        assert_eq!(RenderSide::Server.to_string(), "server-render");
        assert_eq!(RenderSide::Client.to_string(), "client-render");
    }
}
