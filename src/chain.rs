//! Interceptor chain: the re-entrant pipeline every request travels through.
//!
//! Generalizes the linear before/after hook pattern into a recursive
//! `proceed`-based design so an interceptor can short-circuit, substitute the
//! request, or drive multiple downstream descents (retry, revalidation)
//! without the executor needing to know about any of that.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::Transport;
use crate::types::{Request, Response};

/// Cooperative cancellation signal shared across one call's descents.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// True once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancellationToken({})", self.is_cancelled())
    }
}

/// A middleware unit in the request pipeline.
///
/// Implement this trait to add cross-cutting behavior: authentication,
/// caching, retry, logging, metrics, or default headers. An interceptor may
/// inspect and rewrite the request, call [`Chain::proceed`] zero or more
/// times, and return a response without ever reaching the transport.
///
/// # Examples
/// ```
/// use netpipe::chain::{Chain, Interceptor};
/// use netpipe::error::Result;
/// use netpipe::types::Response;
/// use async_trait::async_trait;
///
/// struct TraceHeader;
///
/// #[async_trait]
/// impl Interceptor for TraceHeader {
///     fn name(&self) -> &str { "trace-header" }
///
///     async fn intercept(&self, mut chain: Chain<'_>) -> Result<Response> {
///         let mut request = chain.request().clone();
///         request.headers_mut().insert("X-Trace", "1");
///         chain.proceed(request).await
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Human-readable name, used in logging and `Debug` output.
    fn name(&self) -> &str;

    /// Observe, mutate, short-circuit, or re-drive the downstream chain.
    async fn intercept(&self, chain: Chain<'_>) -> Result<Response>;
}

impl fmt::Debug for dyn Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interceptor({})", self.name())
    }
}

/// Immutable, shareable list of interceptors plus the terminal transport.
///
/// Cloning is cheap: interceptors and the transport are held behind `Arc`.
#[derive(Clone)]
pub(crate) struct Pipeline {
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub(crate) fn new(interceptors: Vec<Arc<dyn Interceptor>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            interceptors: Arc::new(interceptors),
            transport,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Begin a fresh descent at index 0 for `request`.
    pub(crate) async fn execute(
        &self,
        request: Request,
        cancellation: &CancellationToken,
    ) -> Result<Response> {
        let chain = Chain {
            pipeline: self,
            index: 0,
            request,
            cancellation,
        };
        chain.run().await
    }
}

/// The capability handed to an [`Interceptor`]: the current request, and the
/// ability to advance to the next interceptor (or the transport).
pub struct Chain<'a> {
    pipeline: &'a Pipeline,
    index: usize,
    request: Request,
    cancellation: &'a CancellationToken,
}

impl<'a> Chain<'a> {
    /// The request as observed at this point in the chain.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// True once this call's [`CancellationToken`] has been cancelled.
    ///
    /// Interceptors that suspend outside of `proceed` (e.g. a retry's
    /// back-off sleep) poll this to stay cancellable.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Advance to the next interceptor (or the transport) with `request`.
    ///
    /// Each call to `proceed` is an independent descent: it does not mutate
    /// any state shared with a prior or future call from the same
    /// interceptor, so an interceptor may call it more than once (retry,
    /// conditional revalidation) safely.
    pub async fn proceed(&self, request: Request) -> Result<Response> {
        if self.cancellation.is_cancelled() {
            return Err(crate::error::NetworkError::Cancelled);
        }
        let next = Chain {
            pipeline: self.pipeline,
            index: self.index + 1,
            request,
            cancellation: self.cancellation,
        };
        next.run().await
    }

    async fn run(self) -> Result<Response> {
        if self.cancellation.is_cancelled() {
            return Err(crate::error::NetworkError::Cancelled);
        }
        match self.pipeline.interceptors.get(self.index) {
            Some(interceptor) => {
                let index = self.index;
                let pipeline = self.pipeline;
                let cancellation = self.cancellation;
                let request = self.request;
                let chain = Chain {
                    pipeline,
                    index,
                    request,
                    cancellation,
                };
                interceptor.intercept(chain).await
            }
            None => self.pipeline.transport.execute(self.request).await,
        }
    }
}
