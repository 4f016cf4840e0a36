//! Error types for the HTTP client.

use thiserror::Error;

/// Errors that can occur while executing a request.
///
/// This taxonomy is intentionally closed: every failure mode the pipeline can
/// produce maps to exactly one of these variants.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The call was cancelled before or during execution.
    #[error("call was cancelled")]
    Cancelled,

    /// The transport returned something that isn't a well-formed HTTP response.
    #[error("invalid response from transport")]
    InvalidResponse,

    /// The underlying transport failed (connect, TLS, read, write, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A body was required but the response carried none.
    #[error("response had no body")]
    NoData,

    /// The response body failed to decode into the requested type.
    #[error("failed to decode response body: {0}")]
    Decoding(String),

    /// The response was not in the 2xx range.
    #[error("HTTP {status}")]
    Http {
        /// Response status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: Vec<u8>,
    },
}

/// A specialized `Result` type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// The underlying cause wrapped by [`NetworkError::Transport`].
///
/// Most transport failures originate from an actual `reqwest` round-trip,
/// but some — a timer racing the downstream chain, for instance — never
/// touch `reqwest` at all. `Other` lets those surface as a real
/// `transport(_)` error rather than being force-fit into an unrelated
/// variant.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failure from the underlying `reqwest` client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// A synthetic transport failure raised by the core itself (e.g. a
    /// timeout).
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Build a synthetic transport failure carrying `message`.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors raised while constructing a [`crate::config::Config`] or its
/// constituent pieces. Distinct from [`NetworkError`] because these can only
/// occur before a client exists to execute anything.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required builder field was never set.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field was set but failed validation.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        /// The parameter name.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// The base URL could not be parsed.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cancelled() {
        assert_eq!(NetworkError::Cancelled.to_string(), "call was cancelled");
    }

    #[test]
    fn display_http() {
        let err = NetworkError::Http {
            status: 404,
            body: b"not found".to_vec(),
        };
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn display_decoding() {
        let err = NetworkError::Decoding("unexpected token".to_string());
        assert_eq!(
            err.to_string(),
            "failed to decode response body: unexpected token"
        );
    }

    #[test]
    fn display_config_missing_field() {
        let err = ConfigError::MissingField("base_url".to_string());
        assert_eq!(err.to_string(), "missing required field: base_url");
    }

    #[test]
    fn display_config_invalid_parameter() {
        let err = ConfigError::InvalidParameter {
            field: "timeout".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid parameter `timeout`: must be positive"
        );
    }
}
