//! Memory Cache Module
//!
//! In-process cache client with per-entry TTL expiration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::cache::{CacheClient, CacheEntry};
use crate::error::{AdapterError, Result};
use crate::tasks::spawn_cleanup_task;

// == Memory Cache ==
/// HashMap-backed [`CacheClient`].
///
/// Expired entries are treated as absent and removed when read. Entries that
/// are never read again are removed by the periodic sweep the adapter starts
/// through [`CacheClient::spawn_maintenance`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    closed: AtomicBool,
}

impl MemoryCache {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert Raw ==
    /// Stores a payload as-is. Lets callers seed entries that may not decode.
    pub async fn insert_raw(
        &self,
        key: impl Into<String>,
        payload: impl Into<String>,
        ttl: Duration,
    ) {
        let entry = CacheEntry::new(payload.into(), ttl);
        self.entries.write().await.insert(key.into(), entry);
    }

    // == Contains ==
    /// Returns true if a live entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    // == Length ==
    /// Number of stored entries, expired ones included until read or cleaned up.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(AdapterError::CacheClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<String> {
        self.ensure_open()?;

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(entry.payload.clone()),
                Some(_) => {}
                None => return Err(AdapterError::CacheMiss(key.to_string())),
            }
        }

        // Expired: drop it unless a fresh write replaced it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
        }
        Err(AdapterError::CacheMiss(key.to_string()))
    }

    async fn set(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        self.insert_raw(key, payload, ttl).await;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(AdapterError::CacheClosed);
        }
        Ok(())
    }

    fn spawn_maintenance(self: Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        Some(spawn_cleanup_task(self, interval))
    }
}
