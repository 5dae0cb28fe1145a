//! Render Cache - memoized rendering of expensive component trees
//!
//! Caches the serialized payload of a rendered subtree under a key derived
//! from a caller identity and the running build's fingerprint, and decodes
//! cached payloads back into trees without blocking the consumer.
//!
//! The bundled binary serves the in-process store over HTTP so that several
//! processes can share it through [`store::RemoteStore`].

pub mod api;
pub mod component;
pub mod config;
pub mod deferred;
pub mod error;
pub mod key;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod tasks;
pub mod transcode;

pub use api::AppState;
pub use component::{Cache, CacheBoundary, CacheClient, CacheOutput, CacheProps, RenderSide};
pub use config::{Config, ExecutionMode};
pub use deferred::{Deferred, Status};
pub use error::{CacheError, Result};
pub use key::{CacheIdentity, CacheKey};
pub use orchestrator::{CacheOrchestrator, CachePolicy};
pub use store::{KvStore, MemoryStore, RemoteStore};
pub use tasks::spawn_cleanup_task;
pub use transcode::{DecodeMode, Node, RenderPayload};
