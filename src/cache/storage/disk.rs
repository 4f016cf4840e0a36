//! Filesystem-backed cache storage: one file per entry, named by the cache key.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{NetworkError, Result};
use crate::types::{Headers, Request, Response};

use super::super::entry::{CacheControlDirectives, CacheEntry};
use super::{cache_key, CacheStorage};

/// Default interval between background sweeps of expired entries.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Serialize, Deserialize)]
struct DiskRecord {
    url: String,
    method: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    timestamp_secs: u64,
    etag: Option<String>,
    last_modified: Option<String>,
    expires_at_secs: Option<u64>,
    directives: CacheControlDirectives,
}

fn to_unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn from_unix_secs(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

impl DiskRecord {
    fn from_entry(url: &str, entry: &CacheEntry) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            status: entry.response.status(),
            headers: entry
                .response
                .headers()
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: entry.response.body().map(|b| b.to_vec()),
            timestamp_secs: to_unix_secs(entry.timestamp),
            etag: entry.etag.clone(),
            last_modified: entry.last_modified.clone(),
            expires_at_secs: entry.expires_at.map(to_unix_secs),
            directives: entry.directives,
        }
    }

    fn into_entry(self) -> CacheEntry {
        let mut headers = Headers::new();
        for (name, value) in self.headers {
            headers.insert(name, value);
        }
        let request = Request::get(self.url.clone());
        let response = Response::new(
            request,
            self.status,
            headers,
            self.body.map(bytes::Bytes::from),
        );
        let timestamp = from_unix_secs(self.timestamp_secs);
        CacheEntry {
            response,
            timestamp,
            last_accessed: timestamp,
            etag: self.etag,
            last_modified: self.last_modified,
            expires_at: self.expires_at_secs.map(from_unix_secs),
            directives: self.directives,
        }
    }
}

/// Persists entries as one JSON file per key under `directory`.
///
/// Writes are atomic: the record is written to a sibling `.tmp` file and
/// renamed into place, so a crash mid-write never leaves a half-written
/// entry behind. A corrupt or unreadable file is treated as a cache miss
/// and removed.
pub struct DiskCacheStorage {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskCacheStorage {
    /// Use `directory` as the cache root, creating it if absent.
    pub async fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| NetworkError::Decoding(format!("cache dir: {e}")))?;
        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.directory.join(cache_key(url))
    }

    /// Spawn a background task that calls [`CacheStorage::clear_expired`]
    /// every `interval`, for as long as `self` (held via `Arc`) is alive.
    pub fn spawn_cleanup_loop(self: &Arc<Self>, default_ttl: Duration, interval: Duration) {
        let storage = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(error) = storage.clear_expired(default_ttl).await {
                    tracing::warn!(%error, "disk cache cleanup sweep failed");
                }
            }
        });
    }

    async fn read_record(path: &Path) -> Option<DiskRecord> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice::<DiskRecord>(&bytes) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(?path, %error, "corrupt disk cache entry, removing");
                let _ = tokio::fs::remove_file(path).await;
                None
            }
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn cached_entry(&self, request: &Request) -> Result<Option<CacheEntry>> {
        let path = self.path_for(request.url());
        Ok(Self::read_record(&path).await.map(DiskRecord::into_entry))
    }

    async fn store(&self, request: &Request, response: Response) -> Result<()> {
        let Some(entry) = CacheEntry::from_response(response, SystemTime::now()) else {
            return Ok(());
        };
        let record = DiskRecord::from_entry(request.url(), &entry);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| NetworkError::Decoding(format!("cache serialize: {e}")))?;

        let _guard = self.write_lock.lock().await;
        let path = self.path_for(request.url());
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| NetworkError::Decoding(format!("cache write: {e}")))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| NetworkError::Decoding(format!("cache rename: {e}")))?;
        Ok(())
    }

    async fn remove(&self, request: &Request) -> Result<()> {
        let path = self.path_for(request.url());
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NetworkError::Decoding(format!("cache remove: {e}"))),
        }
    }

    async fn clear_expired(&self, default_ttl: Duration) -> Result<()> {
        let mut dir = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| NetworkError::Decoding(format!("cache readdir: {e}")))?;
        let now = SystemTime::now();
        while let Ok(Some(file)) = dir.next_entry().await {
            let path = file.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            if let Some(record) = Self::read_record(&path).await {
                let entry = record.into_entry();
                if !entry.is_fresh(now, default_ttl) {
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut dir = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| NetworkError::Decoding(format!("cache readdir: {e}")))?;
        while let Ok(Some(file)) = dir.next_entry().await {
            let _ = tokio::fs::remove_file(file.path()).await;
        }
        Ok(())
    }
}
