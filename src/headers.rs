//! The built-in [`Interceptor`] that applies a fixed set of default headers.
//!
//! Distinct from [`crate::client::Client`]'s base-URL/default-header
//! resolution (applied once, before the chain is entered): this interceptor
//! lets a caller attach defaults at an arbitrary point in the chain, e.g.
//! after auth has already set `Authorization`.

use async_trait::async_trait;

use crate::chain::{Chain, Interceptor};
use crate::error::Result;
use crate::types::{Headers, Response};

/// Merges a fixed set of headers under the request's own, so request headers
/// always win on conflict.
pub struct DefaultHeadersInterceptor {
    defaults: Headers,
}

impl DefaultHeadersInterceptor {
    /// Apply `defaults` to every request that reaches this interceptor.
    pub fn new(defaults: Headers) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl Interceptor for DefaultHeadersInterceptor {
    fn name(&self) -> &str {
        "default-headers"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let mut request = chain.request().clone();
        request.headers_mut().merge_under(&self.defaults);
        chain.proceed(request).await
    }
}
