//! Higher-level credential tracking with preemptive refresh.

use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::coordinator::AuthRefreshCoordinator;
use super::credentials::{AuthCredentials, DEFAULT_EXPIRY_THRESHOLD};
use super::token_store::TokenStore;

/// Source of fresh credentials, e.g. an OAuth token endpoint.
///
/// Concrete OAuth/SSO flows are external collaborators; this trait is the
/// only surface the core depends on.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Obtain a new set of credentials, using the refresh token from
    /// `current` if the provider supports refresh-token exchange.
    async fn refresh(&self, current: Option<&AuthCredentials>) -> Result<AuthCredentials, String>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &str;
}

impl fmt::Debug for dyn AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthProvider({})", self.provider_name())
    }
}

/// Tracks the active credential set for a client and coordinates refreshes.
///
/// Combines a [`TokenStore`] (what the auth interceptor reads to attach
/// `Authorization` headers) with the full [`AuthCredentials`] (refresh
/// token, expiration) needed to decide when to refresh preemptively.
pub struct AuthManager {
    provider: Box<dyn AuthProvider>,
    credentials: RwLock<Option<AuthCredentials>>,
    token_store: TokenStore,
    coordinator: AuthRefreshCoordinator,
    expiry_threshold: Duration,
}

impl AuthManager {
    /// Build a manager around `provider` with the default debounce and
    /// expiry threshold.
    pub fn new(provider: impl AuthProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            credentials: RwLock::new(None),
            token_store: TokenStore::new(),
            coordinator: AuthRefreshCoordinator::default(),
            expiry_threshold: DEFAULT_EXPIRY_THRESHOLD,
        }
    }

    /// Override the preemptive-refresh threshold (default 300s).
    pub fn with_expiry_threshold(mut self, threshold: Duration) -> Self {
        self.expiry_threshold = threshold;
        self
    }

    /// The token store the auth interceptor reads from.
    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    /// The currently known credentials, if a refresh has ever succeeded.
    pub fn credentials(&self) -> Option<AuthCredentials> {
        self.credentials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Force a refresh through the coordinator, regardless of expiration.
    pub async fn refresh(&self) -> Result<String, String> {
        let current = self.credentials();
        self.coordinator
            .refresh_if_needed(&self.token_store, || async {
                let fresh = self.provider.refresh(current.as_ref()).await?;
                let token = fresh.access_token().to_string();
                *self.credentials.write().unwrap_or_else(|e| e.into_inner()) = Some(fresh);
                Ok(token)
            })
            .await
    }

    /// Refresh only if the current credentials are missing or expiring soon.
    pub async fn refresh_if_expiring(&self, now: Instant) -> Result<String, String> {
        let needs_refresh = match self.credentials() {
            Some(creds) => creds.is_expiring_soon(self.expiry_threshold, now),
            None => true,
        };
        if needs_refresh {
            self.refresh().await
        } else {
            Ok(self.token_store.current().unwrap_or_default())
        }
    }

    /// Clear credentials and the token store.
    pub fn logout(&self) {
        *self.credentials.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.token_store.clear();
    }
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("provider", &self.provider.provider_name())
            .field("has_credentials", &self.credentials().is_some())
            .finish()
    }
}
