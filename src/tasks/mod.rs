//! Background Tasks Module
//!
//! Contains background tasks spawned by the adapter.
//!
//! # Tasks
//! - Cache writer: repopulates the cache after a fallback fetch
//! - TTL cleanup: sweeps expired entries out of the in-process cache

mod cleanup;
mod writer;

pub use cleanup::spawn_cleanup_task;
pub use writer::CacheWriter;
