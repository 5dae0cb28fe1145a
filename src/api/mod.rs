//! API Module
//!
//! HTTP surface of the KV service, so several render processes can share one
//! store through [`RemoteStore`](crate::store::RemoteStore).

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
