//! In-process cache storage: a mapping from URL to entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Request, Response};

use super::super::entry::CacheEntry;
use super::{cache_key, CacheStorage};

/// Keeps every entry in an in-process map.
///
/// Unlike [`super::disk::DiskCacheStorage`], there is no background sweep:
/// stale entries are pruned only when [`CacheStorage::clear_expired`] is
/// called explicitly, or overwritten on the next store.
#[derive(Default)]
pub struct MemoryCacheStorage {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn cached_entry(&self, request: &Request) -> Result<Option<CacheEntry>> {
        let key = cache_key(request.url());
        // Stale entries are still returned — the cache interceptor decides
        // whether to revalidate or treat the lookup as a miss.
        Ok(self.lock().get(&key).cloned())
    }

    async fn store(&self, request: &Request, response: Response) -> Result<()> {
        let Some(entry) = CacheEntry::from_response(response, SystemTime::now()) else {
            return Ok(());
        };
        let key = cache_key(request.url());
        self.lock().insert(key, entry);
        Ok(())
    }

    async fn remove(&self, request: &Request) -> Result<()> {
        let key = cache_key(request.url());
        self.lock().remove(&key);
        Ok(())
    }

    async fn clear_expired(&self, default_ttl: Duration) -> Result<()> {
        let now = SystemTime::now();
        self.lock()
            .retain(|_, entry| entry.is_fresh(now, default_ttl));
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Headers;

    fn get(url: &str) -> Request {
        Request::get(url)
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let storage = MemoryCacheStorage::new();
        let request = get("https://example.com/a");
        let response = Response::new(
            request.clone(),
            200,
            Headers::new(),
            Some(bytes::Bytes::from_static(b"cached")),
        );
        storage.store(&request, response).await.unwrap();
        let found = storage.cached_response(&request).await.unwrap().unwrap();
        assert_eq!(found.body().unwrap().as_ref(), b"cached");
    }

    #[tokio::test]
    async fn no_store_directive_is_not_written() {
        let storage = MemoryCacheStorage::new();
        let request = get("https://example.com/a");
        let mut headers = Headers::new();
        headers.insert("Cache-Control", "no-store");
        storage
            .store(&request, Response::new(request.clone(), 200, headers, None))
            .await
            .unwrap();
        assert!(storage.cached_entry(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_expired_removes_stale_entries_only() {
        let storage = MemoryCacheStorage::new();
        let request = get("https://example.com/a");
        storage
            .store(&request, Response::new(request.clone(), 200, Headers::new(), None))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        storage.clear_expired(Duration::from_secs(0)).await.unwrap();
        assert!(storage.cached_entry(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_entry() {
        let storage = MemoryCacheStorage::new();
        let request = get("https://example.com/a");
        storage
            .store(&request, Response::new(request.clone(), 200, Headers::new(), None))
            .await
            .unwrap();
        storage.remove(&request).await.unwrap();
        assert!(storage.cached_entry(&request).await.unwrap().is_none());
    }
}
