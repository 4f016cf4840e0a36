//! A composable client-side HTTP networking library built around an
//! interceptor pipeline.
//!
//! A [`Request`](types::Request) travels leaf-to-root through an ordered
//! chain of [`Interceptor`](chain::Interceptor)s before reaching a terminal
//! [`Transport`](transport::Transport). Authentication, response caching,
//! retry, deduplication, logging, and default headers are all built-in
//! interceptors layered on top of the same `proceed`-based chain — nothing
//! about the executor is special-cased for them.
//!
//! ```no_run
//! use netpipe::config::ClientBuilder;
//! use netpipe::client::Client;
//! use netpipe::types::Request;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientBuilder::new()
//!     .base_url("https://api.example.com")
//!     .build()?;
//! let client = Client::new(config).await?;
//! let response = client.new_call(Request::get("/v1/status")).execute().await?;
//! assert!(response.is_successful());
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

pub mod auth;
pub mod cache;
pub mod call;
pub mod chain;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod headers;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod timeout;
pub mod transport;
pub mod types;

pub use call::{Call, CallHandle};
pub use chain::{CancellationToken, Chain, Interceptor};
pub use client::{decode, decode_json, Client};
pub use config::{CacheConfig, CacheStorageKind, ClientBuilder, Config, PoolConfig, TimeoutConfig};
pub use dedup::DeduplicationInterceptor;
pub use error::{ConfigError, NetworkError, Result, TransportError};
pub use headers::DefaultHeadersInterceptor;
pub use logging::LoggingInterceptor;
pub use retry::{RetryConfig, RetryInterceptor};
pub use timeout::TimeoutInterceptor;
pub use transport::{ReqwestTransport, Transport};
pub use types::{Body, CachePolicy, Headers, Method, MultipartPart, Priority, Request, Response};
