//! Cache Client
//!
//! Consumes a cached payload: decoding starts immediately and its outcome is
//! exposed through a [`Deferred`], so a re-entrant consumer can check the
//! settled state before waiting on it again.

use std::fmt;

use crate::component::RenderSide;
use crate::deferred::{Deferred, Status};
use crate::error::{CacheError, Result};
use crate::transcode::{decode, DecodeMode, Node, RenderPayload};

pub struct CacheClient {
    side: RenderSide,
    tree: Deferred<Node>,
}

impl CacheClient {
    /// Starts decoding `payload`. Must be called within a tokio runtime.
    pub fn new(payload: RenderPayload, mode: DecodeMode) -> Self {
        let side = RenderSide::from(&mode);
        let tree = Deferred::wrap(async move {
            decode(&payload, &mode).await.map_err(CacheError::from)
        });
        Self { side, tree }
    }

    pub fn side(&self) -> RenderSide {
        self.side
    }

    pub fn status(&self) -> Status {
        self.tree.status()
    }

    /// The decoded tree if decoding already settled.
    pub fn try_tree(&self) -> Option<Result<Node>> {
        self.tree.try_value()
    }

    /// Waits for the decoded tree.
    pub async fn tree(&self) -> Result<Node> {
        self.tree.value().await
    }

    /// Abandons a decode that is still pending.
    pub fn cancel(&self) -> bool {
        self.tree.cancel("cache client cancelled")
    }
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("side", &self.side)
            .field("status", &self.status())
            .finish()
    }
}
