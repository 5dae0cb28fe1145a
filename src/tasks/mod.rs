//! Background Tasks Module
//!
//! Periodic work run by the KV service.

mod cleanup;

pub use cleanup::spawn_cleanup_task;
