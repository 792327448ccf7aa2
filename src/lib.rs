//! Cached Database - read-through Redis cache over a pooled PostgreSQL store
//!
//! [`Adapter`] owns the cache client and the connection pool; [`with_cache`]
//! serves records from the cache and falls back to a caller-supplied fetch,
//! repopulating the cache in the background.

pub mod adapter;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod tasks;

pub use adapter::{Adapter, DatabaseAdapter};
pub use api::AppState;
pub use cache::{with_cache, CacheClient, MemoryCache, RedisCache};
pub use config::{Config, MigrationConfig};
pub use error::{AdapterError, Result};
pub use query::PgExecutor;
