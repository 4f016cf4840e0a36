//! The built-in [`Interceptor`] that retries transient failures.

use std::time::Duration;

use async_trait::async_trait;

use crate::chain::{Chain, Interceptor};
use crate::error::{NetworkError, Result};
use crate::metrics::{NetworkMetrics, RetryMetricEvent};
use crate::types::Response;

use std::sync::Arc;

/// Retry policy: how many attempts, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Number of retries *after* the first attempt; total transport
    /// invocations are `max_attempts + 1`. A value of `0` disables retry —
    /// a single attempt, no retry.
    pub max_attempts: u32,
    /// Base delay between attempts; doubled per attempt and jittered.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status) || status == 408 || status == 429
}

/// Deterministic jitter in `[50, 100)%` of `delay`, derived from `url` and
/// `attempt` rather than a random source, so retry timing stays reproducible
/// in tests.
fn jittered_delay(delay: Duration, url: &str, attempt: u32) -> Duration {
    let jitter_numer = (url.len() as u64 * attempt as u64) % 50 + 50;
    let delay_ms = delay.as_millis() as u64 * jitter_numer / 100;
    Duration::from_millis(delay_ms)
}

/// Retries the downstream chain on retryable transport errors and status
/// codes, sleeping `base_delay` (doubled per attempt, jittered) in between.
///
/// A retry re-invokes [`Chain::proceed`] against the same chain position, so
/// only interceptors registered *after* this one, plus the transport, are
/// re-run — earlier interceptors (auth, cache) see a single descent.
pub struct RetryInterceptor {
    config: RetryConfig,
    metrics: Arc<dyn NetworkMetrics>,
}

impl RetryInterceptor {
    /// Build a retry interceptor from `config`, reporting each retry to
    /// `metrics`.
    pub fn new(config: RetryConfig, metrics: Arc<dyn NetworkMetrics>) -> Self {
        Self { config, metrics }
    }

    fn report(&self, chain: &Chain<'_>, attempt_number: u32, reason: &str) {
        self.metrics.record_retry(RetryMetricEvent {
            method: chain.request().method(),
            url: chain.request().url().to_string(),
            attempt_number,
            reason: reason.to_string(),
        });
    }
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    fn name(&self) -> &str {
        "retry"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let request = chain.request().clone();
        let url = request.url().to_string();
        let mut last_error: Option<NetworkError> = None;

        for attempt in 0..=self.config.max_attempts {
            if attempt > 0 {
                let delay = jittered_delay(
                    self.config.base_delay * 2u32.saturating_pow(attempt - 1),
                    &url,
                    attempt,
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancellation_watch(&chain) => return Err(NetworkError::Cancelled),
                }
            }

            let can_retry = attempt < self.config.max_attempts;

            match chain.proceed(request.clone()).await {
                Ok(response) => {
                    if is_retryable_status(response.status()) && can_retry {
                        self.report(&chain, attempt + 1, &format!("http {}", response.status()));
                        last_error = Some(NetworkError::Http {
                            status: response.status(),
                            body: response.body().map(|b| b.to_vec()).unwrap_or_default(),
                        });
                        continue;
                    }
                    return Ok(response);
                }
                Err(NetworkError::Cancelled) => return Err(NetworkError::Cancelled),
                Err(error @ NetworkError::Transport(_)) if can_retry => {
                    self.report(&chain, attempt + 1, "transport error");
                    last_error = Some(error);
                    continue;
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or(NetworkError::Cancelled))
    }
}

/// Polls the chain's cancellation signal so the retry sleep remains
/// cancellable without a dedicated wake mechanism.
async fn cancellation_watch(chain: &Chain<'_>) {
    loop {
        if chain.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CancellationToken, Pipeline};
    use crate::metrics::NoopMetrics;
    use crate::transport::Transport;
    use crate::types::{Headers, Request};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyThenOk {
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyThenOk {
        async fn execute(&self, request: crate::types::Request) -> Result<Response> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Ok(Response::new(request, 503, Headers::new(), None))
            } else {
                Ok(Response::new(request, 200, Headers::new(), None))
            }
        }
    }

    fn pipeline(transport: Arc<dyn Transport>, config: RetryConfig) -> Pipeline {
        let interceptor: Arc<dyn Interceptor> =
            Arc::new(RetryInterceptor::new(config, Arc::new(NoopMetrics)));
        Pipeline::new(vec![interceptor], transport)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_within_max_attempts() {
        let transport = Arc::new(FlakyThenOk {
            failures: 2,
            attempts: AtomicU32::new(0),
        });
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        let pipeline = pipeline(transport.clone(), config);
        let request = Request::get("https://example.com");
        let cancellation = CancellationToken::new();
        let response = pipeline.execute(request, &cancellation).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_surfaces_last_status() {
        let transport = Arc::new(FlakyThenOk {
            failures: 10,
            attempts: AtomicU32::new(0),
        });
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        let pipeline = pipeline(transport.clone(), config);
        let request = Request::get("https://example.com");
        let cancellation = CancellationToken::new();
        let response = pipeline.execute(request, &cancellation).await.unwrap();
        assert_eq!(response.status(), 503);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_attempts_disables_retry() {
        let transport = Arc::new(FlakyThenOk {
            failures: 10,
            attempts: AtomicU32::new(0),
        });
        let config = RetryConfig {
            max_attempts: 0,
            base_delay: Duration::from_millis(10),
        };
        let pipeline = pipeline(transport.clone(), config);
        let request = Request::get("https://example.com");
        let cancellation = CancellationToken::new();
        let response = pipeline.execute(request, &cancellation).await.unwrap();
        assert_eq!(response.status(), 503);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_status_returns_immediately() {
        struct NotFound;
        #[async_trait]
        impl Transport for NotFound {
            async fn execute(&self, request: crate::types::Request) -> Result<Response> {
                Ok(Response::new(request, 404, Headers::new(), None))
            }
        }
        let pipeline = pipeline(Arc::new(NotFound), RetryConfig::default());
        let request = Request::get("https://example.com");
        let cancellation = CancellationToken::new();
        let response = pipeline.execute(request, &cancellation).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_surfaces_cancelled() {
        let transport = Arc::new(FlakyThenOk {
            failures: 10,
            attempts: AtomicU32::new(0),
        });
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
        };
        let pipeline = pipeline(transport, config);
        let request = Request::get("https://example.com");
        let cancellation = CancellationToken::new();
        let cancel_handle = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cancel_handle.cancel();
        });
        let result = pipeline.execute(request, &cancellation).await;
        assert!(matches!(result, Err(NetworkError::Cancelled)));
    }
}
