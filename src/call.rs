//! `Call`: a one-shot, cancellable execution of a single request.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chain::{CancellationToken, Pipeline};
use crate::error::{NetworkError, Result};
use crate::metrics::{ErrorMetricEvent, NetworkMetrics, RequestMetricEvent};
use crate::types::{Headers, Request, Response};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELLED: u8 = 3;

/// The client-side defaults and pipeline a [`Call`] resolves its request
/// against. Built by [`crate::client::Client::new_call`]; opaque to callers.
#[derive(Clone)]
pub(crate) struct CallResources {
    pub(crate) base_url: Option<String>,
    pub(crate) default_headers: Headers,
    pub(crate) default_timeout: Option<Duration>,
    pub(crate) pipeline: Pipeline,
    pub(crate) metrics: Arc<dyn NetworkMetrics>,
}

fn resolve_url(base_url: Option<&str>, url: &str) -> Result<String> {
    if url::Url::parse(url).is_ok() {
        return Ok(url.to_string());
    }
    let Some(base_url) = base_url else {
        return Ok(url.to_string());
    };
    let base = url::Url::parse(base_url)
        .map_err(|e| NetworkError::Decoding(format!("invalid base url: {e}")))?;
    let joined = base
        .join(url)
        .map_err(|e| NetworkError::Decoding(format!("invalid relative url: {e}")))?;
    Ok(joined.to_string())
}

/// A shareable handle to cancel an in-flight or not-yet-started [`Call`].
#[derive(Clone)]
pub struct CallHandle {
    cancellation: CancellationToken,
}

impl CallHandle {
    /// Cancel the call. Idempotent; safe to call before, during, or after
    /// execution — a call that has already completed is unaffected.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// True once [`CallHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// One execution of a single [`Request`] against a client's resolved
/// defaults and interceptor pipeline.
///
/// A `Call` is single-use: [`Call::execute`] consumes `self`, and a second
/// call into the same underlying state is a programming error (it panics,
/// mirroring the "second execution" invariant of the systems this pattern is
/// modeled on).
pub struct Call {
    request: Request,
    resources: CallResources,
    state: Arc<AtomicU8>,
    cancellation: CancellationToken,
}

impl Call {
    pub(crate) fn new(request: Request, resources: CallResources) -> Self {
        Self {
            request,
            resources,
            state: Arc::new(AtomicU8::new(IDLE)),
            cancellation: CancellationToken::new(),
        }
    }

    /// Obtain a cloneable handle that can cancel this call from another task,
    /// independent of whether `execute` has been called yet.
    pub fn handle(&self) -> CallHandle {
        CallHandle {
            cancellation: self.cancellation.clone(),
        }
    }

    /// Cancel this call directly. Equivalent to `self.handle().cancel()`.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// True once this call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    fn resolve_request(&self) -> Result<Request> {
        let url = resolve_url(self.resources.base_url.as_deref(), self.request.url())?;
        let mut request = self.request.clone().with_url(url);
        request
            .headers_mut()
            .merge_under(&self.resources.default_headers);
        if request.timeout().is_none() {
            if let Some(default_timeout) = self.resources.default_timeout {
                request = request.with_timeout(default_timeout);
            }
        }
        Ok(request)
    }

    /// Run the call to completion.
    ///
    /// # Panics
    /// Panics if called more than once on the same `Call`.
    pub async fn execute(self) -> Result<Response> {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .expect("Call::execute invoked more than once");

        if self.cancellation.is_cancelled() {
            self.state.store(CANCELLED, Ordering::SeqCst);
            return Err(NetworkError::Cancelled);
        }

        let result = match self.resolve_request() {
            Ok(request) => {
                let method = request.method();
                let url = request.url().to_string();
                let start = Instant::now();
                let outcome = self
                    .resources
                    .pipeline
                    .execute(request, &self.cancellation)
                    .await;
                let duration = start.elapsed();
                match &outcome {
                    Ok(response) => self.resources.metrics.record_request(RequestMetricEvent {
                        method,
                        url,
                        status: Some(response.status()),
                        duration,
                    }),
                    Err(error) => {
                        self.resources.metrics.record_request(RequestMetricEvent {
                            method,
                            url: url.clone(),
                            status: None,
                            duration,
                        });
                        self.resources.metrics.record_error(ErrorMetricEvent {
                            method,
                            url,
                            message: error.to_string(),
                        });
                    }
                }
                outcome
            }
            Err(error) => Err(error),
        };

        if self.cancellation.is_cancelled() {
            self.state.store(CANCELLED, Ordering::SeqCst);
        } else {
            self.state.store(COMPLETED, Ordering::SeqCst);
        }
        result
    }
}
