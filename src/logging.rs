//! The built-in [`Interceptor`] that traces requests via `tracing`.

use std::time::Instant;

use async_trait::async_trait;

use crate::chain::{Chain, Interceptor};
use crate::error::Result;
use crate::types::Response;

/// Logs each request's method, URL, outcome, and duration at `debug`
/// (success) or `warn` (failure) level.
///
/// Distinct from [`crate::metrics::NetworkMetrics`]: this interceptor is for
/// humans reading logs, not for aggregation.
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let request = chain.request().clone();
        let method = request.method();
        let url = request.url().to_string();

        tracing::debug!(%method, %url, "executing request");
        let start = Instant::now();
        let result = chain.proceed(request).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(%method, %url, status = response.status(), ?elapsed, "request completed");
            }
            Err(error) => {
                tracing::warn!(%method, %url, %error, ?elapsed, "request failed");
            }
        }
        result
    }
}
