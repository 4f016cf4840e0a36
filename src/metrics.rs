//! Non-blocking observability events emitted by the pipeline.
//!
//! Distinct from `tracing`-based logging (see the logging interceptor):
//! metrics events are structured and intended for aggregation, not reading.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::Method;

/// Emitted after every transport round-trip, success or failure.
#[derive(Debug, Clone)]
pub struct RequestMetricEvent {
    /// Request method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// Response status, if one was received.
    pub status: Option<u16>,
    /// Wall-clock duration of the round-trip.
    pub duration: Duration,
}

/// Emitted when a request fails with a [`crate::error::NetworkError`].
#[derive(Debug, Clone)]
pub struct ErrorMetricEvent {
    /// Request method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// Rendered error message.
    pub message: String,
}

/// Emitted for each retry attempt beyond the first.
#[derive(Debug, Clone)]
pub struct RetryMetricEvent {
    /// Request method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// 1-indexed attempt number among retries (the first retry is `1`).
    pub attempt_number: u32,
    /// Why the retry happened, e.g. `"http 503"` or `"transport error"`.
    pub reason: String,
}

/// Result of a cache lookup, reported by the cache interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheResult {
    /// Served from cache without contacting the origin.
    Hit,
    /// No usable entry; origin was contacted.
    Miss,
    /// A conditional request to the origin confirmed the cached entry.
    Revalidated,
}

/// Emitted by the cache interceptor for every `GET` it handles.
#[derive(Debug, Clone)]
pub struct CacheMetricEvent {
    /// Request URL.
    pub url: String,
    /// Lookup outcome.
    pub result: CacheResult,
}

/// Receives pipeline events. Implementations must not block request
/// progress; a collector that needs to do I/O should hand events off to a
/// background task rather than await inline.
pub trait NetworkMetrics: Send + Sync {
    /// A request completed (successfully or not) at the transport boundary.
    fn record_request(&self, event: RequestMetricEvent);

    /// A request ultimately failed.
    fn record_error(&self, event: ErrorMetricEvent);

    /// A retry attempt was made.
    fn record_retry(&self, event: RetryMetricEvent);

    /// A cache lookup completed.
    fn record_cache_hit(&self, event: CacheMetricEvent);
}

impl fmt::Debug for dyn NetworkMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkMetrics")
    }
}

/// A [`NetworkMetrics`] implementation that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl NetworkMetrics for NoopMetrics {
    fn record_request(&self, _event: RequestMetricEvent) {}
    fn record_error(&self, _event: ErrorMetricEvent) {}
    fn record_retry(&self, _event: RetryMetricEvent) {}
    fn record_cache_hit(&self, _event: CacheMetricEvent) {}
}

/// Fans events out to every collector in the list.
///
/// Used internally by [`crate::client::Client`] to present its configured
/// `metrics_collectors` as a single [`NetworkMetrics`].
#[derive(Clone, Default)]
pub(crate) struct CompositeMetrics {
    collectors: Vec<Arc<dyn NetworkMetrics>>,
}

impl CompositeMetrics {
    pub(crate) fn new(collectors: Vec<Arc<dyn NetworkMetrics>>) -> Self {
        Self { collectors }
    }
}

impl NetworkMetrics for CompositeMetrics {
    fn record_request(&self, event: RequestMetricEvent) {
        for collector in &self.collectors {
            collector.record_request(event.clone());
        }
    }

    fn record_error(&self, event: ErrorMetricEvent) {
        for collector in &self.collectors {
            collector.record_error(event.clone());
        }
    }

    fn record_retry(&self, event: RetryMetricEvent) {
        for collector in &self.collectors {
            collector.record_retry(event.clone());
        }
    }

    fn record_cache_hit(&self, event: CacheMetricEvent) {
        for collector in &self.collectors {
            collector.record_cache_hit(event.clone());
        }
    }
}
