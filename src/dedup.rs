//! The built-in [`Interceptor`] that collapses concurrent identical `GET`s.
//!
//! Not part of the cache core: this runs regardless of `cache_policy` and
//! only coalesces requests that are in flight *right now* — it never stores
//! a result past the request it was serving. Grounded on the same
//! single-flight-via-`watch` pattern as the auth refresh coordinator.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::chain::{Chain, Interceptor};
use crate::error::{NetworkError, Result};
use crate::types::{Method, Response};

type Outcome = Result<Response, String>;

enum Role {
    Follower(watch::Receiver<Option<Outcome>>),
    Leader(watch::Sender<Option<Outcome>>),
}

/// Coalesces concurrent `GET` requests for the same URL onto a single
/// downstream invocation; every waiter observes the same response or error.
#[derive(Default)]
pub struct DeduplicationInterceptor {
    in_flight: Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>,
}

impl DeduplicationInterceptor {
    /// Create an interceptor with no in-flight requests tracked yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn join_or_lead(&self, key: &str) -> Role {
        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rx) = map.get(key) {
            Role::Follower(rx.clone())
        } else {
            let (tx, rx) = watch::channel(None);
            map.insert(key.to_string(), rx);
            Role::Leader(tx)
        }
    }
}

fn outcome_to_result(outcome: Outcome) -> Result<Response> {
    outcome.map_err(NetworkError::Decoding)
}

#[async_trait]
impl Interceptor for DeduplicationInterceptor {
    fn name(&self) -> &str {
        "deduplication"
    }

    async fn intercept(&self, chain: Chain<'_>) -> Result<Response> {
        let request = chain.request().clone();
        if request.method() != Method::Get {
            return chain.proceed(request).await;
        }
        let key = request.url().to_string();

        match self.join_or_lead(&key) {
            Role::Follower(mut rx) => loop {
                if let Some(outcome) = rx.borrow().clone() {
                    return outcome_to_result(outcome);
                }
                if rx.changed().await.is_err() {
                    // The leader vanished (panicked) without publishing a
                    // result; run directly rather than hang forever.
                    return chain.proceed(request).await;
                }
            },
            Role::Leader(tx) => {
                let result = chain.proceed(request).await;
                self.in_flight
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&key);
                let outcome: Outcome = match &result {
                    Ok(response) => Ok(response.clone()),
                    Err(error) => Err(error.to_string()),
                };
                let _ = tx.send(Some(outcome));
                result
            }
        }
    }
}
