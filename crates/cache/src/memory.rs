//! In-memory cache store with LRU eviction.
//!
//! Entries carry an optional deadline and are expired lazily: an expired
//! entry reads as absent and is dropped the next time it is touched.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{CacheError, CacheStore, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded in-memory cache store.
///
/// Thread-safe through `Arc<RwLock<LruCache>>`; clones share the same
/// entries. The least recently used entry is evicted once `max_entries` is
/// reached.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<LruCache<String, CacheEntry>>>,
}

impl MemoryStore {
    /// Creates a store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(max_entries).ok_or_else(|| {
            CacheError::OperationFailed("max_entries must be greater than zero".to_string())
        })?;
        Ok(Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        })
    }

    /// Number of entries held, including expired ones not yet dropped.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.pop(key);
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn flush_all(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new(10).unwrap();
        store.set("k", b"v", TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new(10).unwrap();
        store.set("k", b"v", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let store = MemoryStore::new(2).unwrap();
        store.set("a", b"1", TTL).await.unwrap();
        store.set("b", b"2", TTL).await.unwrap();
        store.get("a").await.unwrap();
        store.set("c", b"3", TTL).await.unwrap();

        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scan_keys_matches_prefix() {
        let store = MemoryStore::new(10).unwrap();
        store.set("records:list:a", b"1", TTL).await.unwrap();
        store.set("records:list:b", b"2", TTL).await.unwrap();
        store.set("other", b"3", TTL).await.unwrap();

        let mut keys = store.scan_keys("records:list:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["records:list:a", "records:list:b"]);
    }

    #[tokio::test]
    async fn flush_all_clears_everything() {
        let store = MemoryStore::new(10).unwrap();
        store.set("a", b"1", TTL).await.unwrap();
        store.set("b", b"2", TTL).await.unwrap();
        store.flush_all().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(MemoryStore::new(0).is_err());
    }
}
