//! A bounded-capacity memory tier fronting a disk tier, promoting on read.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Request, Response};

use super::super::entry::CacheEntry;
use super::disk::DiskCacheStorage;
use super::{cache_key, CacheStorage};

/// Memory tier of bounded size, LRU-evicted by last-access time, backed by
/// a [`DiskCacheStorage`] for everything that doesn't fit.
///
/// Reads probe memory first; a disk hit is promoted into memory. Writes go
/// to both tiers. When the memory tier exceeds `capacity`, the entry with
/// the oldest `last_accessed` timestamp is evicted from memory (it remains
/// recoverable from disk).
pub struct HybridCacheStorage {
    memory: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
    disk: Arc<DiskCacheStorage>,
}

impl HybridCacheStorage {
    /// Build a hybrid store with `capacity` memory slots in front of `disk`.
    pub fn new(capacity: usize, disk: Arc<DiskCacheStorage>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            capacity,
            disk,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn promote(&self, key: String, mut entry: CacheEntry) -> CacheEntry {
        entry.last_accessed = SystemTime::now();
        let mut memory = self.lock();
        memory.insert(key, entry.clone());
        if memory.len() > self.capacity {
            if let Some(oldest_key) = memory
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                memory.remove(&oldest_key);
            }
        }
        entry
    }
}

#[async_trait]
impl CacheStorage for HybridCacheStorage {
    async fn cached_entry(&self, request: &Request) -> Result<Option<CacheEntry>> {
        let key = cache_key(request.url());
        if let Some(mut entry) = self.lock().get(&key).cloned() {
            entry.last_accessed = SystemTime::now();
            self.lock().insert(key, entry.clone());
            return Ok(Some(entry));
        }
        match self.disk.cached_entry(request).await? {
            Some(entry) => Ok(Some(self.promote(key, entry))),
            None => Ok(None),
        }
    }

    async fn store(&self, request: &Request, response: Response) -> Result<()> {
        self.disk.store(request, response.clone()).await?;
        let Some(entry) = CacheEntry::from_response(response, SystemTime::now()) else {
            return Ok(());
        };
        let key = cache_key(request.url());
        self.promote(key, entry);
        Ok(())
    }

    async fn remove(&self, request: &Request) -> Result<()> {
        let key = cache_key(request.url());
        self.lock().remove(&key);
        self.disk.remove(request).await
    }

    async fn clear_expired(&self, default_ttl: Duration) -> Result<()> {
        let now = SystemTime::now();
        self.lock()
            .retain(|_, entry| entry.is_fresh(now, default_ttl));
        self.disk.clear_expired(default_ttl).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.lock().clear();
        self.disk.clear_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Headers;

    async fn hybrid(capacity: usize) -> HybridCacheStorage {
        let dir = tempfile::tempdir().unwrap();
        // Leak the tempdir so it outlives the storage in these tests; fine
        // for short-lived test processes.
        let path = dir.into_path();
        let disk = Arc::new(DiskCacheStorage::new(path).await.unwrap());
        HybridCacheStorage::new(capacity, disk)
    }

    fn response(request: &Request, body: &'static str) -> Response {
        Response::new(
            request.clone(),
            200,
            Headers::new(),
            Some(bytes::Bytes::from_static(body.as_bytes())),
        )
    }

    #[tokio::test]
    async fn store_then_read_hits_memory() {
        let storage = hybrid(4).await;
        let request = Request::get("https://example.com/a");
        storage.store(&request, response(&request, "a")).await.unwrap();
        let found = storage.cached_response(&request).await.unwrap().unwrap();
        assert_eq!(found.body().unwrap().as_ref(), b"a");
    }

    #[tokio::test]
    async fn eviction_beyond_capacity_keeps_entry_recoverable_from_disk() {
        let storage = hybrid(2).await;
        for i in 0..3 {
            let request = Request::get(format!("https://example.com/{i}"));
            storage.store(&request, response(&request, "x")).await.unwrap();
        }

        // The memory tier holds at most `capacity` entries...
        assert!(storage.lock().len() <= 2);

        // ...but every entry, including the evicted first one, is still on disk.
        let first = Request::get("https://example.com/0");
        let recovered = storage.cached_response(&first).await.unwrap();
        assert!(recovered.is_some());
    }

    #[tokio::test]
    async fn reading_from_disk_promotes_into_memory() {
        let storage = hybrid(2).await;
        for i in 0..3 {
            let request = Request::get(format!("https://example.com/{i}"));
            storage.store(&request, response(&request, "x")).await.unwrap();
        }
        let first_key = cache_key("https://example.com/0");
        assert!(!storage.lock().contains_key(&first_key));

        let first = Request::get("https://example.com/0");
        storage.cached_entry(&first).await.unwrap();

        assert!(storage.lock().contains_key(&first_key));
    }
}
