//! Cache Repopulation Writer
//!
//! Background task that writes freshly fetched values back into the cache.
//!
//! Writes are queued on a bounded channel and executed by a dispatcher that
//! caps concurrent writes with a semaphore and applies a deadline to each one,
//! so a slow cache endpoint cannot accumulate unbounded work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{AccessStats, CacheClient};
use crate::config::WriterConfig;

/// A serialized value waiting to be written.
#[derive(Debug)]
struct WriteJob {
    key: String,
    payload: String,
}

/// Handle to the background writer.
#[derive(Debug)]
pub struct CacheWriter {
    tx: mpsc::Sender<WriteJob>,
    handle: JoinHandle<()>,
    stats: Arc<AccessStats>,
}

impl CacheWriter {
    /// Spawns the dispatcher task. Must be called within a tokio runtime.
    ///
    /// # Arguments
    /// * `cache` - client the writes are issued against
    /// * `config` - queue capacity, concurrency and per-write deadline
    /// * `ttl` - expiry applied to every written entry
    /// * `stats` - counters updated with each write's outcome
    pub fn spawn<C: CacheClient>(
        cache: Arc<C>,
        config: &WriterConfig,
        ttl: Duration,
        stats: Arc<AccessStats>,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<WriteJob>(config.queue_capacity.max(1));
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        let write_timeout = config.write_timeout;
        let task_stats = stats.clone();

        info!(
            "Starting cache writer: queue={}, in_flight={}, timeout={:?}",
            config.queue_capacity, config.max_in_flight, write_timeout
        );

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };

                let cache = cache.clone();
                let stats = task_stats.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    write(cache.as_ref(), job, ttl, write_timeout, &stats).await;
                });
            }

            debug!("Cache writer queue closed");
        });

        Self { tx, handle, stats }
    }

    // == Submit ==
    /// Queues a write without waiting. Returns false if the write was dropped.
    pub fn submit(&self, key: String, payload: String) -> bool {
        match self.tx.try_send(WriteJob { key, payload }) {
            Ok(()) => {
                self.stats.record_write_queued();
                true
            }
            Err(TrySendError::Full(job)) => {
                self.stats.record_write_dropped();
                debug!(key = %job.key, "Cache write queue full, dropping write");
                false
            }
            Err(TrySendError::Closed(job)) => {
                self.stats.record_write_dropped();
                debug!(key = %job.key, "Cache writer stopped, dropping write");
                false
            }
        }
    }

    // == Shutdown ==
    /// Stops the dispatcher. Writes already running finish within their deadline.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn write<C: CacheClient>(
    cache: &C,
    job: WriteJob,
    ttl: Duration,
    write_timeout: Duration,
    stats: &AccessStats,
) {
    match tokio::time::timeout(write_timeout, cache.set(&job.key, job.payload, ttl)).await {
        Ok(Ok(())) => {
            stats.record_write_completed();
            debug!(key = %job.key, "Cache repopulated");
        }
        Ok(Err(e)) => {
            stats.record_write_failed();
            warn!(key = %job.key, error = %e, "Cache write failed");
        }
        Err(_) => {
            stats.record_write_failed();
            warn!(key = %job.key, "Cache write exceeded {:?}", write_timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::Result;
    use async_trait::async_trait;

    /// Cache whose writes never complete.
    struct StalledCache;

    #[async_trait]
    impl CacheClient for StalledCache {
        async fn get(&self, key: &str) -> Result<String> {
            Err(crate::error::AdapterError::CacheMiss(key.to_string()))
        }

        async fn set(&self, _key: &str, _payload: String, _ttl: Duration) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn writer_config(queue_capacity: usize, max_in_flight: usize) -> WriterConfig {
        WriterConfig {
            queue_capacity,
            max_in_flight,
            write_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_writer_repopulates_cache() {
        let cache = Arc::new(MemoryCache::new());
        let stats = Arc::new(AccessStats::new());
        let writer = CacheWriter::spawn(
            cache.clone(),
            &writer_config(8, 2),
            Duration::from_secs(60),
            stats.clone(),
        );

        assert!(writer.submit("author:1".to_string(), "{\"id\":1}".to_string()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get("author:1").await.unwrap(), "{\"id\":1}");
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.writes_queued, 1);
        assert_eq!(snapshot.writes_completed, 1);

        writer.shutdown();
    }

    #[tokio::test]
    async fn test_stalled_write_hits_deadline() {
        let stats = Arc::new(AccessStats::new());
        let writer = CacheWriter::spawn(
            Arc::new(StalledCache),
            &writer_config(8, 2),
            Duration::from_secs(60),
            stats.clone(),
        );

        writer.submit("k".to_string(), "v".to_string());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(stats.snapshot().writes_failed, 1);
        writer.shutdown();
    }

    #[tokio::test]
    async fn test_full_queue_drops_writes() {
        let stats = Arc::new(AccessStats::new());
        let writer = CacheWriter::spawn(
            Arc::new(StalledCache),
            &writer_config(1, 1),
            Duration::from_secs(60),
            stats.clone(),
        );

        // One write in flight, one waiting for a permit, one queued; the rest overflow
        let accepted = (0..10)
            .filter(|i| writer.submit(format!("k{}", i), "v".to_string()))
            .count();

        assert!(accepted < 10);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.writes_queued, accepted as u64);
        assert_eq!(snapshot.writes_dropped, (10 - accepted) as u64);

        writer.shutdown();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_dropped() {
        let stats = Arc::new(AccessStats::new());
        let writer = CacheWriter::spawn(
            Arc::new(MemoryCache::new()),
            &writer_config(8, 2),
            Duration::from_secs(60),
            stats.clone(),
        );

        writer.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(writer.is_finished(), "Dispatcher should be finished after shutdown");
        assert!(!writer.submit("k".to_string(), "v".to_string()));
        assert_eq!(stats.snapshot().writes_dropped, 1);
    }
}
