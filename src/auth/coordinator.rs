//! Single-flight, debounced token refresh.
//!
//! Grounded on the read-then-double-check-under-lock pattern used by this
//! crate's credential-caching wrapper: a fast path for the common case, and
//! a slow path that re-checks after acquiring exclusive access before doing
//! real work. The addition here is coalescing concurrent callers onto one
//! in-flight refresh. A `watch` channel publishes the latest outcome so a
//! waiter that subscribes before the refresh finishes can never miss the
//! notification, unlike a bare `Notify` which requires the waiter to already
//! be polling when the wake happens.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use super::token_store::TokenStore;

/// Default window after a completed refresh during which a second refresh
/// request is satisfied from the last outcome instead of triggering another
/// round-trip.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

struct State {
    in_flight: bool,
    last_completed: Option<Instant>,
}

/// Coalesces concurrent refresh requests into a single underlying refresh
/// call, and suppresses refresh storms shortly after a successful refresh.
pub struct AuthRefreshCoordinator {
    state: Mutex<State>,
    outcome_tx: watch::Sender<Option<Result<String, String>>>,
    debounce: Duration,
}

impl Default for AuthRefreshCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl AuthRefreshCoordinator {
    /// Create a coordinator with a custom debounce window.
    pub fn new(debounce: Duration) -> Self {
        let (outcome_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(State {
                in_flight: false,
                last_completed: None,
            }),
            outcome_tx,
            debounce,
        }
    }

    /// Refresh the token in `token_store`, or coalesce onto an in-flight /
    /// recently-completed refresh.
    ///
    /// `do_refresh` is invoked at most once across any set of callers that
    /// overlap in time or fall within the debounce window of a completed
    /// call.
    pub async fn refresh_if_needed<F, Fut>(
        &self,
        token_store: &TokenStore,
        do_refresh: F,
    ) -> Result<String, String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, String>>,
    {
        let mut outcomes = self.outcome_tx.subscribe();

        loop {
            let should_run = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

                if let Some(last_completed) = state.last_completed
                    && last_completed.elapsed() < self.debounce
                    && !state.in_flight
                    && matches!(outcomes.borrow().as_ref(), Some(Ok(_)))
                {
                    let outcome = outcomes.borrow().clone();
                    return outcome
                        .unwrap_or_else(|| Ok(token_store.current().unwrap_or_default()));
                }

                if state.in_flight {
                    false
                } else {
                    state.in_flight = true;
                    true
                }
            };

            if should_run {
                let outcome = do_refresh().await;
                if let Ok(ref token) = outcome {
                    token_store.update(token.clone());
                }
                {
                    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                    state.in_flight = false;
                    // Only a completed, successful refresh starts the debounce
                    // window — a failure must let the very next caller retry.
                    if outcome.is_ok() {
                        state.last_completed = Some(Instant::now());
                    }
                }
                let _ = self.outcome_tx.send(Some(outcome.clone()));
                return outcome;
            }

            if outcomes.changed().await.is_err() {
                return Err("refresh coordinator closed".to_string());
            }
            if let Some(outcome) = outcomes.borrow().clone() {
                return outcome;
            }
            // Spurious change unrelated to a completed refresh; loop and
            // re-examine the shared state.
        }
    }

    /// Time since the last completed refresh, if any.
    pub fn time_since_last_refresh(&self) -> Option<Duration> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_completed
            .map(|instant| instant.elapsed())
    }
}
