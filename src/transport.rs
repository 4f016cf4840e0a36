//! The terminal sink every interceptor chain bottoms out at.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{NetworkError, Result, TransportError};
use crate::types::{Headers, Request, Response};

/// Performs the actual network I/O for a resolved [`Request`].
///
/// A transport owns cancellation and failure translation: anything other
/// than a well-formed HTTP response must surface as
/// [`NetworkError::Transport`] or [`NetworkError::InvalidResponse`], never as
/// a bare panic or an opaque string.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` and return the resulting response or error.
    async fn execute(&self, request: Request) -> Result<Response>;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transport")
    }
}

/// Default [`Transport`] backed by [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing `reqwest::Client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a transport with the crate's default connection settings:
    /// a 10s connect timeout and a 30s read timeout, mirroring the defaults
    /// the rest of the pipeline assumes when no override is configured.
    pub fn with_defaults() -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method().to_reqwest(), request.url());

        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body() {
            let (bytes, content_type) = body.encode();
            builder = builder.header("content-type", content_type).body(bytes);
        }

        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkError::Transport(TransportError::Reqwest(e)))?;
        let status = response.status().as_u16();

        let mut headers = Headers::new();
        for (name, value) in response.headers().iter() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(name.as_str().to_string(), value_str.to_string());
            }
        }

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Transport(TransportError::Reqwest(e)))?;
        let body = if body.is_empty() { None } else { Some(body) };

        Ok(Response::new(request, status, headers, body))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A transport that records the last request it saw and returns a fixed
    /// 200 response; used by chain and interceptor unit tests that must not
    /// hit the network.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        last_request: Mutex<Option<Request>>,
        call_count: std::sync::atomic::AtomicU32,
    }

    impl RecordingTransport {
        pub(crate) fn last_request(&self) -> Option<Request> {
            self.last_request.lock().unwrap().clone()
        }

        pub(crate) fn call_count(&self) -> u32 {
            self.call_count.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn execute(&self, request: Request) -> Result<Response> {
            self.call_count
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            Ok(Response::new(request, 200, Headers::new(), None))
        }
    }

    #[tokio::test]
    async fn reqwest_transport_builds_with_defaults() {
        assert!(ReqwestTransport::with_defaults().is_ok());
    }
}
