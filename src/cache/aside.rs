//! Cache-Aside Accessor
//!
//! Read-through access to the authoritative store: serve from the cache when
//! possible, otherwise fetch and repopulate the cache in the background.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::cache::CacheClient;
use crate::error::AdapterError;

/// Returns the value cached under `key`, or the result of `retrieve`.
///
/// The cache read is bounded by the adapter's connection timeout. Any read
/// problem (absent key, transport failure, timeout, undecodable payload) falls
/// back to `retrieve`, which then runs exactly once. A successful fetch is
/// handed to the background writer and returned without waiting for the
/// write; a failed fetch is returned unchanged and nothing is cached.
///
/// Concurrent misses on the same key are not coalesced: each call fetches and
/// each queues a write, last one wins.
///
/// # Example
/// ```ignore
/// let author = with_cache(&adapter, &format!("author:{}", id), || {
///     adapter.queries().get_author(id)
/// })
/// .await?;
/// ```
pub async fn with_cache<Q, C, U, E, F, Fut>(
    adapter: &Adapter<Q, C>,
    key: &str,
    retrieve: F,
) -> Result<U, E>
where
    C: CacheClient,
    U: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    if let Some(value) = lookup(adapter, key).await {
        return Ok(value);
    }

    retrieve_and_cache(adapter, key, retrieve).await
}

async fn lookup<Q, C, U>(adapter: &Adapter<Q, C>, key: &str) -> Option<U>
where
    C: CacheClient,
    U: DeserializeOwned,
{
    let stats = &adapter.stats;

    let read = tokio::time::timeout(adapter.connection_timeout, adapter.cache.get(key)).await;
    let payload = match read {
        Ok(Ok(payload)) => payload,
        Ok(Err(AdapterError::CacheMiss(_))) => {
            stats.record_miss();
            debug!(key, "Cache miss");
            return None;
        }
        Ok(Err(e)) => {
            stats.record_cache_error();
            warn!(key, error = %e, "Cache read failed, falling back to store");
            return None;
        }
        Err(_) => {
            stats.record_cache_error();
            warn!(key, "Cache read timed out, falling back to store");
            return None;
        }
    };

    match serde_json::from_str(&payload) {
        Ok(value) => {
            stats.record_hit();
            Some(value)
        }
        Err(e) => {
            stats.record_corrupt_entry();
            warn!(key, error = %e, "Undecodable cache entry, falling back to store");
            None
        }
    }
}

async fn retrieve_and_cache<Q, C, U, E, F, Fut>(
    adapter: &Adapter<Q, C>,
    key: &str,
    retrieve: F,
) -> Result<U, E>
where
    C: CacheClient,
    U: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    adapter.stats.record_fetch();

    let value = match retrieve().await {
        Ok(value) => value,
        Err(e) => {
            adapter.stats.record_fetch_failure();
            return Err(e);
        }
    };

    match serde_json::to_string(&value) {
        Ok(payload) => {
            adapter.writer.submit(key.to_string(), payload);
        }
        Err(e) => {
            adapter.stats.record_write_dropped();
            debug!(key, error = %e, "Value not serializable, skipping cache write");
        }
    }

    Ok(value)
}
