//! Component Module
//!
//! The presentation-facing pieces: the cache component that produces
//! payloads, the client that decodes them and the boundary that contains
//! their failures.

mod boundary;
mod cache;
mod client;

pub use boundary::{default_fallback, CacheBoundary, FallbackFn, RenderSide, RESET_ACTION};
pub use cache::{raw_payload_node, Cache, CacheOutput, CacheProps, PayloadRenderer, Renderer};
pub use client::CacheClient;
