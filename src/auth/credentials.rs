//! Credential value types.

use std::fmt;
use std::time::{Duration, Instant};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string zeroed on drop and redacted in `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecretString(String);

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// When an access token was issued and how long it is valid for.
#[derive(Debug, Clone, Copy)]
pub struct TokenExpiration {
    /// When the token was issued.
    pub issued_at: Instant,
    /// How long after `issued_at` the token remains valid.
    pub expires_in: Duration,
}

impl TokenExpiration {
    /// True if `now` is at or past the expiration instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.issued_at + self.expires_in
    }

    /// True if fewer than `threshold` remain before expiration at `now`.
    ///
    /// Treats an already-expired token as expiring soon.
    pub fn is_expiring_soon(&self, threshold: Duration, now: Instant) -> bool {
        let expires_at = self.issued_at + self.expires_in;
        match expires_at.checked_duration_since(now) {
            Some(remaining) => remaining <= threshold,
            None => true,
        }
    }
}

/// Default threshold used by [`crate::auth::AuthManager`] to decide a token
/// is expiring soon enough to refresh preemptively.
pub const DEFAULT_EXPIRY_THRESHOLD: Duration = Duration::from_secs(300);

/// Resolved authentication material for one provider.
#[derive(Clone)]
pub struct AuthCredentials {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    expiration: Option<TokenExpiration>,
    provider: String,
}

impl AuthCredentials {
    /// Build credentials from an access token with no known expiration.
    pub fn new(access_token: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            access_token: SecretString(access_token.into()),
            refresh_token: None,
            expiration: None,
            provider: provider.into(),
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString(refresh_token.into()));
        self
    }

    /// Attach expiration metadata.
    pub fn with_expiration(mut self, expiration: TokenExpiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// The bearer access token.
    pub fn access_token(&self) -> &str {
        &self.access_token.0
    }

    /// The refresh token, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|s| s.0.as_str())
    }

    /// The provider tag this credential came from.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// True if `now` is at or past expiration. Credentials with no known
    /// expiration are treated as never expiring.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiration.is_some_and(|e| e.is_expired(now))
    }

    /// True if fewer than `threshold` remain before expiration at `now`.
    pub fn is_expiring_soon(&self, threshold: Duration, now: Instant) -> bool {
        self.expiration
            .is_some_and(|e| e.is_expiring_soon(threshold, now))
    }
}

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("access_token", &"****")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "****"),
            )
            .field("expiration", &self.expiration)
            .field("provider", &self.provider)
            .finish()
    }
}
