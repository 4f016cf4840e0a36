//! Client configuration: a layered, validated [`Config`] built through
//! [`ClientBuilder`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::DEFAULT_CLEANUP_INTERVAL;
use crate::chain::Interceptor;
use crate::error::{ConfigError, Result};
use crate::metrics::NetworkMetrics;
use crate::retry::RetryConfig;
use crate::transport::Transport;
use crate::types::Headers;

/// Configuration for HTTP connection pooling.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections per host (default: no limit).
    pub max_idle_per_host: Option<usize>,
    /// Idle connection timeout (default: 90 seconds).
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: None,
            idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Configuration for HTTP timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// TCP connect timeout (default: 10 seconds).
    pub connect_timeout: Duration,
    /// Per-response read timeout (default: 30 seconds).
    pub read_timeout: Duration,
    /// Overall request timeout including retries (default: none).
    pub request_timeout: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            request_timeout: None,
        }
    }
}

/// Selects the response cache's storage backend.
#[derive(Debug, Clone)]
pub enum CacheStorageKind {
    /// No cache interceptor is installed; requests always hit the transport.
    Disabled,
    /// In-process only; lost on restart.
    Memory,
    /// Filesystem-backed, rooted at `directory`.
    Disk {
        /// Root directory for cache entry files.
        directory: PathBuf,
    },
    /// A bounded in-memory tier of `capacity` entries in front of a disk tier.
    Hybrid {
        /// Root directory for the backing disk tier.
        directory: PathBuf,
        /// Maximum number of entries kept in the memory tier.
        capacity: usize,
    },
}

impl Default for CacheStorageKind {
    fn default() -> Self {
        CacheStorageKind::Memory
    }
}

/// Configuration for response caching.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Which storage backend to use.
    pub storage: CacheStorageKind,
    /// Freshness window applied to entries with no explicit `expires_at`.
    pub default_ttl: Duration,
    /// How often a disk-backed tier sweeps for expired entries in the
    /// background. Unused by [`CacheStorageKind::Memory`].
    pub disk_cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage: CacheStorageKind::default(),
            default_ttl: Duration::from_secs(300),
            disk_cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Resolved, immutable client configuration.
///
/// Built exclusively through [`ClientBuilder::build`]; there is no public
/// constructor, so a live `Config` is always one that passed validation.
#[derive(Clone)]
pub struct Config {
    pub(crate) base_url: Option<String>,
    pub(crate) default_headers: Headers,
    pub(crate) timeout: Option<Duration>,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) metrics_collectors: Vec<Arc<dyn NetworkMetrics>>,
    pub(crate) enable_deduplication: bool,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) retry_config: RetryConfig,
    pub(crate) cache_config: CacheConfig,
    pub(crate) pool_config: PoolConfig,
    pub(crate) timeout_config: TimeoutConfig,
}

impl Config {
    /// The base URL requests are resolved against, if one was configured.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Headers merged under every request that doesn't already set them.
    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }

    /// Default per-request timeout applied when a request sets none.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether concurrent identical `GET`s are collapsed onto one call.
    pub fn enable_deduplication(&self) -> bool {
        self.enable_deduplication
    }

    /// Retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Cache configuration.
    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache_config
    }

    /// Connection pool configuration.
    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    /// Timeout configuration.
    pub fn timeout_config(&self) -> &TimeoutConfig {
        &self.timeout_config
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("interceptor_count", &self.interceptors.len())
            .field("metrics_collector_count", &self.metrics_collectors.len())
            .field("enable_deduplication", &self.enable_deduplication)
            .field("retry_config", &self.retry_config)
            .field("cache_config", &self.cache_config)
            .field("pool_config", &self.pool_config)
            .field("timeout_config", &self.timeout_config)
            .finish()
    }
}

/// Builder for constructing a [`Config`] (and, usually, the
/// [`crate::client::Client`] wrapping it).
///
/// # Examples
/// ```
/// use netpipe::config::ClientBuilder;
///
/// let config = ClientBuilder::new()
///     .base_url("https://api.example.com")
///     .enable_deduplication(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url(), Some("https://api.example.com"));
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    default_headers: Headers,
    timeout: Option<Duration>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    metrics_collectors: Vec<Arc<dyn NetworkMetrics>>,
    enable_deduplication: bool,
    transport: Option<Arc<dyn Transport>>,
    retry_config: RetryConfig,
    cache_config: CacheConfig,
    pool_config: PoolConfig,
    timeout_config: TimeoutConfig,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL relative requests are resolved against.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a header merged under every outbound request that doesn't already
    /// set it.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Set the default per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append an interceptor to the pipeline, in call order.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Register a metrics collector to receive pipeline events.
    pub fn metrics_collector(mut self, collector: Arc<dyn NetworkMetrics>) -> Self {
        self.metrics_collectors.push(collector);
        self
    }

    /// Enable or disable collapsing of concurrent identical `GET`s.
    pub fn enable_deduplication(mut self, enable: bool) -> Self {
        self.enable_deduplication = enable;
        self
    }

    /// Override the transport used to perform actual network I/O.
    ///
    /// Defaults to [`crate::transport::ReqwestTransport`] built from
    /// [`PoolConfig`] and [`TimeoutConfig`] if not set.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Set the cache configuration.
    pub fn cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    /// Set the connection pool configuration.
    pub fn pool_config(mut self, pool_config: PoolConfig) -> Self {
        self.pool_config = pool_config;
        self
    }

    /// Set the timeout configuration.
    pub fn timeout_config(mut self, timeout_config: TimeoutConfig) -> Self {
        self.timeout_config = timeout_config;
        self
    }

    /// Build the [`Config`], validating all required fields.
    pub fn build(self) -> Result<Config, ConfigError> {
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        }

        Ok(Config {
            base_url: self.base_url,
            default_headers: self.default_headers,
            timeout: self.timeout,
            interceptors: self.interceptors,
            metrics_collectors: self.metrics_collectors,
            enable_deduplication: self.enable_deduplication,
            transport: self.transport,
            retry_config: self.retry_config,
            cache_config: self.cache_config,
            pool_config: self.pool_config,
            timeout_config: self.timeout_config,
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("interceptor_count", &self.interceptors.len())
            .field("metrics_collector_count", &self.metrics_collectors.len())
            .field("enable_deduplication", &self.enable_deduplication)
            .field("retry_config", &self.retry_config)
            .field("cache_config", &self.cache_config)
            .field("pool_config", &self.pool_config)
            .field("timeout_config", &self.timeout_config)
            .finish()
    }
}
