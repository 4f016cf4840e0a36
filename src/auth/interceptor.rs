//! The interceptor that attaches bearer tokens and drives 401 recovery.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::chain::{Chain, Interceptor};
use crate::error::Result;
use crate::types::Response;

use super::token_store::TokenStore;

/// Decides how to recover from a `401` response.
///
/// Implementations typically hold an [`super::manager::AuthManager`] and call
/// its [`super::manager::AuthManager::refresh`], which itself goes through
/// the single-flight coordinator.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Given the request that produced a 401 and the 401 response itself,
    /// return a substitute request to retry once, or `None` to surrender.
    async fn authenticate(
        &self,
        original_request: &crate::types::Request,
        response: &Response,
    ) -> Option<crate::types::Request>;
}

impl fmt::Debug for dyn Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authenticator")
    }
}

/// Attaches `Authorization: Bearer <token>` from a [`TokenStore`] and, on a
/// 401 response, asks an [`Authenticator`] for a substitute request to retry
/// exactly once.
pub struct AuthInterceptor {
    token_store: Arc<TokenStore>,
    authenticator: Arc<dyn Authenticator>,
}

impl AuthInterceptor {
    /// Build an interceptor over a shared token store and authenticator.
    pub fn new(token_store: Arc<TokenStore>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            token_store,
            authenticator,
        }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let mut request = chain.request().clone();
        if request.headers().get("Authorization").is_none()
            && let Some(token) = self.token_store.current()
            && !token.is_empty()
        {
            request
                .headers_mut()
                .insert("Authorization", format!("Bearer {token}"));
        }

        let original_request = request.clone();
        let response = chain.proceed(request).await?;

        if response.status() != 401 {
            return Ok(response);
        }

        match self
            .authenticator
            .authenticate(&original_request, &response)
            .await
        {
            Some(retry_request) => chain.proceed(retry_request).await,
            None => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CancellationToken, Interceptor as _, Pipeline};
    use crate::transport::tests::RecordingTransport;
    use crate::types::{Headers, Request};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTransport {
        fail_until_token: &'static str,
    }

    #[async_trait]
    impl crate::transport::Transport for FlakyTransport {
        async fn execute(&self, request: Request) -> Result<Response> {
            let authorized = request
                .headers()
                .get("Authorization")
                .map(|v| v == format!("Bearer {}", self.fail_until_token))
                .unwrap_or(false);
            if authorized {
                Ok(Response::new(request, 200, Headers::new(), None))
            } else {
                Ok(Response::new(request, 401, Headers::new(), None))
            }
        }
    }

    struct RefreshOnce {
        calls: AtomicU32,
        new_token: &'static str,
    }

    #[async_trait]
    impl Authenticator for RefreshOnce {
        async fn authenticate(
            &self,
            _original_request: &Request,
            _response: &Response,
        ) -> Option<Request> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut retry = Request::get("https://example.com");
            retry
                .headers_mut()
                .insert("Authorization", format!("Bearer {}", self.new_token));
            Some(retry)
        }
    }

    #[tokio::test]
    async fn attaches_token_from_store() {
        let store = Arc::new(TokenStore::with_token("abc"));
        let transport = Arc::new(RecordingTransport::default());
        let authenticator: Arc<dyn Authenticator> = Arc::new(RefreshOnce {
            calls: AtomicU32::new(0),
            new_token: "abc",
        });
        let interceptor: Arc<dyn Interceptor> =
            Arc::new(AuthInterceptor::new(store, authenticator));
        let pipeline =
            Pipeline::new(vec![interceptor], transport.clone());
        let request = Request::get("https://example.com");
        pipeline
            .execute(request, &CancellationToken::new())
            .await
            .unwrap();
        let seen = transport.last_request().unwrap();
        assert_eq!(seen.headers().get("Authorization"), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn does_not_override_existing_authorization() {
        let store = Arc::new(TokenStore::with_token("abc"));
        let transport = Arc::new(RecordingTransport::default());
        let authenticator: Arc<dyn Authenticator> = Arc::new(RefreshOnce {
            calls: AtomicU32::new(0),
            new_token: "abc",
        });
        let interceptor: Arc<dyn Interceptor> =
            Arc::new(AuthInterceptor::new(store, authenticator));
        let pipeline =
            Pipeline::new(vec![interceptor], transport.clone());
        let request = Request::get("https://example.com").with_header("Authorization", "Bearer manual");
        pipeline
            .execute(request, &CancellationToken::new())
            .await
            .unwrap();
        let seen = transport.last_request().unwrap();
        assert_eq!(seen.headers().get("Authorization"), Some("Bearer manual"));
    }

    #[tokio::test]
    async fn retries_once_after_401_with_refreshed_token() {
        let store = Arc::new(TokenStore::with_token("stale"));
        let transport = Arc::new(FlakyTransport {
            fail_until_token: "fresh",
        });
        let authenticator = Arc::new(RefreshOnce {
            calls: AtomicU32::new(0),
            new_token: "fresh",
        });
        let interceptor: Arc<dyn Interceptor> =
            Arc::new(AuthInterceptor::new(store, authenticator.clone()));
        let pipeline = Pipeline::new(vec![interceptor], transport);
        let request = Request::get("https://example.com");
        let response = pipeline
            .execute(request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn surrenders_when_authenticator_declines() {
        struct Declining;
        #[async_trait]
        impl Authenticator for Declining {
            async fn authenticate(&self, _: &Request, _: &Response) -> Option<Request> {
                None
            }
        }

        let store = Arc::new(TokenStore::with_token("stale"));
        let transport = Arc::new(FlakyTransport {
            fail_until_token: "fresh",
        });
        let interceptor: Arc<dyn Interceptor> =
            Arc::new(AuthInterceptor::new(store, Arc::new(Declining)));
        let pipeline = Pipeline::new(vec![interceptor], transport);
        let request = Request::get("https://example.com");
        let response = pipeline
            .execute(request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }
}
