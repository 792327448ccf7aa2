//! TTL Cleanup Task
//!
//! Background task that periodically removes expired entries from a
//! [`MemoryCache`]. Without it, keys written once and never read again would
//! stay in memory after expiring.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// # Arguments
/// * `cache` - shared reference to the cache
/// * `interval` - time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, aborted when the adapter closes.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(MemoryCache::new());
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<MemoryCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_task_removes_unread_expired_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .insert_raw("expire_soon", "value", Duration::from_millis(20))
            .await;

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(150)).await;

        // len() counts expired entries until they are swept
        assert_eq!(cache.len().await, 0, "Expired entry should have been cleaned up");

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .insert_raw("long_lived", "value", Duration::from_secs(3600))
            .await;

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.contains("long_lived").await, "Valid entry should not be removed");
        assert_eq!(cache.len().await, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(Arc::new(MemoryCache::new()), Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
