//! The HTTP client: resolves [`Config`] into a runnable interceptor pipeline
//! and hands out one-shot [`Call`]s.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::cache::{
    CacheInterceptor, CacheStorage, DiskCacheStorage, HybridCacheStorage, MemoryCacheStorage,
};
use crate::call::{Call, CallResources};
use crate::chain::{Interceptor, Pipeline};
use crate::config::{CacheStorageKind, Config};
use crate::dedup::DeduplicationInterceptor;
use crate::error::{ConfigError, NetworkError, Result};
use crate::metrics::{CompositeMetrics, NetworkMetrics};
use crate::retry::RetryInterceptor;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::Request;

/// Build the cache storage backend `kind` selects, spawning the disk tier's
/// background cleanup loop (if any) along the way.
async fn build_cache_storage(
    kind: &CacheStorageKind,
    default_ttl: std::time::Duration,
    cleanup_interval: std::time::Duration,
) -> Result<Option<Arc<dyn CacheStorage>>, NetworkError> {
    match kind {
        CacheStorageKind::Disabled => Ok(None),
        CacheStorageKind::Memory => {
            Ok(Some(Arc::new(MemoryCacheStorage::new()) as Arc<dyn CacheStorage>))
        }
        CacheStorageKind::Disk { directory } => {
            let disk = Arc::new(
                DiskCacheStorage::new(directory.clone())
                    .await
                    .map_err(|e| NetworkError::Decoding(format!("cache storage: {e}")))?,
            );
            disk.spawn_cleanup_loop(default_ttl, cleanup_interval);
            Ok(Some(disk as Arc<dyn CacheStorage>))
        }
        CacheStorageKind::Hybrid { directory, capacity } => {
            let disk = Arc::new(
                DiskCacheStorage::new(directory.clone())
                    .await
                    .map_err(|e| NetworkError::Decoding(format!("cache storage: {e}")))?,
            );
            disk.spawn_cleanup_loop(default_ttl, cleanup_interval);
            let hybrid = Arc::new(HybridCacheStorage::new(*capacity, disk));
            Ok(Some(hybrid as Arc<dyn CacheStorage>))
        }
    }
}

fn build_reqwest_transport(config: &Config) -> Result<Arc<dyn Transport>, NetworkError> {
    let pool = config.pool_config();
    let timeouts = config.timeout_config();
    let mut builder = reqwest::Client::builder().connect_timeout(timeouts.connect_timeout);
    if let Some(max_idle) = pool.max_idle_per_host {
        builder = builder.pool_max_idle_per_host(max_idle);
    }
    if let Some(idle_timeout) = pool.idle_timeout {
        builder = builder.pool_idle_timeout(idle_timeout);
    }
    let client = builder
        .build()
        .map_err(|e| NetworkError::Decoding(format!("building transport: {e}")))?;
    Ok(Arc::new(ReqwestTransport::new(client)))
}

/// An HTTP client built from a resolved [`Config`].
///
/// Cheap to clone: internally shares its pipeline and transport via `Arc`.
/// Construct through [`crate::config::ClientBuilder`] and [`Client::new`].
#[derive(Clone)]
pub struct Client {
    config: Config,
    resources: CallResources,
}

impl Client {
    /// Resolve `config` into a client, constructing its cache storage (which
    /// may touch the filesystem) and default transport.
    ///
    /// Pipeline order, earliest to latest: deduplication (if enabled), the
    /// configured interceptors in order, the cache interceptor (if enabled),
    /// then retry, then the transport. Retry sits closest to the transport
    /// so a retried attempt re-does only the real network call, not a fresh
    /// cache lookup or dedup join.
    pub async fn new(config: Config) -> std::result::Result<Self, ConfigError> {
        let storage = build_cache_storage(
            &config.cache_config.storage,
            config.cache_config.default_ttl,
            config.cache_config.disk_cleanup_interval,
        )
        .await
        .map_err(|e| ConfigError::InvalidParameter {
            field: "cache_config.storage".into(),
            reason: e.to_string(),
        })?;

        let metrics: Arc<dyn NetworkMetrics> =
            Arc::new(CompositeMetrics::new(config.metrics_collectors.clone()));

        let transport = match &config.transport {
            Some(transport) => transport.clone(),
            None => build_reqwest_transport(&config).map_err(|e| ConfigError::InvalidParameter {
                field: "transport".into(),
                reason: e.to_string(),
            })?,
        };

        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();
        if config.enable_deduplication {
            interceptors.push(Arc::new(DeduplicationInterceptor::new()));
        }
        interceptors.extend(config.interceptors.iter().cloned());
        if let Some(storage) = storage {
            interceptors.push(Arc::new(CacheInterceptor::new(
                storage,
                config.cache_config.default_ttl,
                metrics.clone(),
            )));
        }
        interceptors.push(Arc::new(RetryInterceptor::new(
            config.retry_config.clone(),
            metrics.clone(),
        )));

        let resources = CallResources {
            base_url: config.base_url.clone(),
            default_headers: config.default_headers.clone(),
            default_timeout: config.timeout,
            pipeline: Pipeline::new(interceptors, transport),
            metrics,
        };

        Ok(Self { config, resources })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Begin a new one-shot execution of `request` against this client's
    /// resolved defaults and pipeline.
    pub fn new_call(&self, request: Request) -> Call {
        Call::new(request, self.resources.clone())
    }
}

/// Execute `call` and decode its response body as `T` via `decoder`.
///
/// Validates the response status is in `[200, 300)` (else
/// [`NetworkError::Http`]), requires a non-empty body (else
/// [`NetworkError::NoData`]), and maps decode failures to
/// [`NetworkError::Decoding`].
pub async fn decode<T>(
    call: Call,
    decoder: impl FnOnce(&[u8]) -> std::result::Result<T, String>,
) -> Result<T> {
    let response = call.execute().await?;
    if !response.is_successful() {
        return Err(NetworkError::Http {
            status: response.status(),
            body: response.body().map(|b| b.to_vec()).unwrap_or_default(),
        });
    }
    let body = response.body().ok_or(NetworkError::NoData)?;
    decoder(body).map_err(NetworkError::Decoding)
}

/// Decode a JSON response body into `T` via [`serde_json`].
pub async fn decode_json<T: DeserializeOwned>(call: Call) -> Result<T> {
    decode(call, |bytes| {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    })
    .await
}
