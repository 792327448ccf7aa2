//! Cache Module
//!
//! Cache clients, the cache-aside accessor and its statistics.

mod aside;
mod client;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use aside::with_cache;
pub use client::{CacheClient, RedisCache};
pub use entry::CacheEntry;
pub use stats::{AccessStats, CacheStats};
pub use store::MemoryCache;
