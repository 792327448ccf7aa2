//! Cache Statistics Module
//!
//! Tracks accessor outcomes: hits, the different kinds of fallback, and the
//! fate of background repopulation writes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Access Stats ==
/// Lock-free counters shared by the accessor and the background writer.
#[derive(Debug, Default)]
pub struct AccessStats {
    hits: AtomicU64,
    misses: AtomicU64,
    cache_errors: AtomicU64,
    corrupt_entries: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    writes_queued: AtomicU64,
    writes_completed: AtomicU64,
    writes_failed: AtomicU64,
    writes_dropped: AtomicU64,
}

impl AccessStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Key absent or expired.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Transport failure or timeout on the read path.
    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Payload present but not decodable into the requested type.
    pub fn record_corrupt_entry(&self) {
        self.corrupt_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_queued(&self) {
        self.writes_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_completed(&self) {
        self.writes_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Transport failure or deadline exceeded on the write path.
    pub fn record_write_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Serialization failure, full queue or stopped writer.
    pub fn record_write_dropped(&self) {
        self.writes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            corrupt_entries: self.corrupt_entries.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            writes_queued: self.writes_queued.load(Ordering::Relaxed),
            writes_completed: self.writes_completed.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            writes_dropped: self.writes_dropped.load(Ordering::Relaxed),
        }
    }
}

// == Cache Stats ==
/// Point-in-time copy of [`AccessStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that found no entry
    pub misses: u64,
    /// Reads that failed or timed out against the cache
    pub cache_errors: u64,
    /// Reads that found an undecodable entry
    pub corrupt_entries: u64,
    /// Calls to the retrieval function
    pub fetches: u64,
    /// Retrieval calls that returned an error
    pub fetch_failures: u64,
    pub writes_queued: u64,
    pub writes_completed: u64,
    pub writes_failed: u64,
    pub writes_dropped: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Every lookup is either a hit or falls back to a fetch, so the rate is
    /// hits / (hits + fetches), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.fetches;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
