//! Storage for the single current bearer token.

use std::sync::RwLock;

/// Owns one optional bearer token. Reads and writes are serialized; never
/// held across an `.await` point, so a blocking `RwLock` is safe here.
#[derive(Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl TokenStore {
    /// Create an empty token store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token store pre-populated with `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// The current token, if one has been set.
    pub fn current(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the current token.
    pub fn update(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    /// Clear the current token, e.g. on logout. Writes the empty string
    /// rather than `None`, so a caller reading immediately after logout sees
    /// an absent-looking token without racing a `None` state.
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(String::new());
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self.current().is_some();
        f.debug_struct("TokenStore").field("present", &present).finish()
    }
}
