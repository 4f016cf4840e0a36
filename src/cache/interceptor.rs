//! The built-in [`Interceptor`] that implements response caching.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::chain::{Chain, Interceptor};
use crate::error::Result;
use crate::metrics::{CacheMetricEvent, CacheResult, NetworkMetrics};
use crate::types::{CachePolicy, Method, Request, Response};

use super::entry::CacheEntry;
use super::storage::CacheStorage;

/// Serves, validates, and populates a [`CacheStorage`] according to each
/// request's [`CachePolicy`].
///
/// Only `GET` requests are consulted; every other method passes straight
/// through to the rest of the chain.
pub struct CacheInterceptor {
    storage: Arc<dyn CacheStorage>,
    default_ttl: Duration,
    metrics: Arc<dyn NetworkMetrics>,
}

impl CacheInterceptor {
    /// Build a cache interceptor over `storage`, using `default_ttl` for
    /// entries with no explicit `expires_at`, and reporting lookups to
    /// `metrics`.
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        default_ttl: Duration,
        metrics: Arc<dyn NetworkMetrics>,
    ) -> Self {
        Self {
            storage,
            default_ttl,
            metrics,
        }
    }

    fn report(&self, url: &str, result: CacheResult) {
        self.metrics.record_cache_hit(CacheMetricEvent {
            url: url.to_string(),
            result,
        });
    }

    /// Call downstream and, on a 2xx response, store it. Always reported as
    /// `miss` — the entry point for both genuine misses and cache-bypassing
    /// policies.
    async fn fetch_and_store(&self, chain: &Chain<'_>, request: Request) -> Result<Response> {
        let response = chain.proceed(request.clone()).await?;
        if response.is_successful() {
            self.storage.store(&request, response.clone()).await?;
        }
        self.report(request.url(), CacheResult::Miss);
        Ok(response)
    }

    /// Issue a conditional request built from `entry`'s validators. A `304`
    /// refreshes the entry's timestamp and serves the cached body; any other
    /// response replaces the entry (or is simply not stored, if not 2xx).
    async fn revalidate(
        &self,
        chain: &Chain<'_>,
        request: &Request,
        entry: &CacheEntry,
    ) -> Result<Response> {
        let mut conditional_request = request.clone();
        for (name, value) in entry.conditional_headers().iter() {
            conditional_request
                .headers_mut()
                .insert(name.to_string(), value.to_string());
        }

        let response = chain.proceed(conditional_request).await?;
        if response.status() == 304 {
            self.storage.store(request, entry.response.clone()).await?;
            self.report(request.url(), CacheResult::Revalidated);
            return Ok(entry.response.clone());
        }

        if response.is_successful() {
            self.storage.store(request, response.clone()).await?;
        }
        self.report(request.url(), CacheResult::Miss);
        Ok(response)
    }
}

#[async_trait]
impl Interceptor for CacheInterceptor {
    fn name(&self) -> &str {
        "cache"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let request = chain.request().clone();
        if request.method() != Method::Get {
            return chain.proceed(request).await;
        }

        let now = SystemTime::now();
        let entry = self.storage.cached_entry(&request).await?;

        match (request.cache_policy(), entry) {
            (CachePolicy::UseCache, Some(entry)) if entry.is_fresh(now, self.default_ttl) => {
                self.report(request.url(), CacheResult::Hit);
                Ok(entry.response.clone())
            }
            (CachePolicy::UseCache, _) => self.fetch_and_store(&chain, request).await,

            (CachePolicy::IgnoreCache, _) => self.fetch_and_store(&chain, request).await,

            (CachePolicy::Revalidate, Some(entry)) => {
                self.revalidate(&chain, &request, &entry).await
            }
            (CachePolicy::Revalidate, None) => self.fetch_and_store(&chain, request).await,

            (CachePolicy::RespectHeaders, Some(entry)) => {
                let fresh = entry.is_fresh(now, self.default_ttl);
                if !fresh && (entry.directives.no_cache || entry.directives.must_revalidate) {
                    self.revalidate(&chain, &request, &entry).await
                } else if fresh {
                    self.report(request.url(), CacheResult::Hit);
                    Ok(entry.response.clone())
                } else {
                    self.fetch_and_store(&chain, request).await
                }
            }
            (CachePolicy::RespectHeaders, None) => self.fetch_and_store(&chain, request).await,
        }
    }
}
