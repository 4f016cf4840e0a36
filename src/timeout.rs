//! The built-in [`Interceptor`] that bounds downstream latency.

use std::time::Duration;

use async_trait::async_trait;

use crate::chain::{CancellationToken, Chain, Interceptor};
use crate::error::{NetworkError, Result, TransportError};
use crate::types::Response;

/// Races the downstream chain against a fixed timer.
///
/// On expiry, the in-flight `proceed` future is dropped — unwinding whatever
/// it was suspended on — and the interceptor yields
/// [`NetworkError::Transport`] carrying a synthetic [`TransportError::Other`],
/// which the retry interceptor already treats as transient. This is never
/// `cancelled`: a timeout is this interceptor's own decision, not an
/// external cancellation of the call.
pub struct TimeoutInterceptor {
    duration: Duration,
}

impl TimeoutInterceptor {
    /// Bound downstream work to at most `duration`.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Interceptor for TimeoutInterceptor {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let request = chain.request().clone();
        match tokio::time::timeout(self.duration, chain.proceed(request)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Transport(TransportError::other(
                "request timed out",
            ))),
        }
    }
}
