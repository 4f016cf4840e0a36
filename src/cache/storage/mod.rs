//! Storage tiers implementing [`CacheStorage`]: memory, disk, and hybrid.

mod disk;
mod hybrid;
mod memory;

pub use disk::{DiskCacheStorage, DEFAULT_CLEANUP_INTERVAL};
pub use hybrid::HybridCacheStorage;
pub use memory::MemoryCacheStorage;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Request, Response};

use super::entry::CacheEntry;

/// Compute the cache key for `request`: the hex-encoded SHA-256 digest of
/// its absolute URL. Only `GET` requests are cacheable; callers must check
/// the method themselves before consulting storage.
pub fn cache_key(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)
}

/// One tier of response cache storage: memory, disk, or a hybrid of both.
///
/// Implementations must serialize their own internal mutation; concurrent
/// stores for the same URL are last-writer-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Look up the full entry (response plus caching metadata) for `request`.
    async fn cached_entry(&self, request: &Request) -> Result<Option<CacheEntry>>;

    /// Look up just the cached response, discarding metadata.
    async fn cached_response(&self, request: &Request) -> Result<Option<Response>> {
        Ok(self
            .cached_entry(request)
            .await?
            .map(|entry| entry.response))
    }

    /// Store `response` for `request`, replacing any existing entry.
    ///
    /// A no-op if `response` carries `Cache-Control: no-store`.
    async fn store(&self, request: &Request, response: Response) -> Result<()>;

    /// Remove any entry for `request`.
    async fn remove(&self, request: &Request) -> Result<()>;

    /// Evict every entry whose freshness window (relative to `default_ttl`)
    /// has elapsed.
    async fn clear_expired(&self, default_ttl: std::time::Duration) -> Result<()>;

    /// Remove every entry regardless of freshness.
    async fn clear_all(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_sha256_hex() {
        let key = cache_key("https://example.com/a");
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key("https://example.com/a"));
        assert_ne!(key, cache_key("https://example.com/b"));
    }
}
