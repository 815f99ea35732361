//! Error types for the Hyperliquid client.
//!
//! Every fallible operation in the crate returns [`Error`]. Local problems
//! (bad input, unknown coins, floats that will not survive the wire format)
//! are separated from transport failures and from structured rejections the
//! exchange itself produces, so callers can match on what actually went wrong.

use serde::Deserialize;

/// Unified error type for the Hyperliquid client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied input failed validation before anything was sent.
    #[error("validation error on field {field}: {message}")]
    Validation {
        /// The offending input field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A symbolic name could not be resolved against the loaded universe.
    #[error("{0}")]
    Resolution(String),

    /// A float cannot be represented in the canonical wire format.
    #[error("{0}")]
    Wire(String),

    /// Hashing or ECDSA signing failed.
    ///
    /// Should not occur with valid key material; surfaced rather than
    /// swallowed so key problems are visible.
    #[error("signing failed: {0}")]
    Signature(String),

    /// Network-level failure; the underlying cause is preserved.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Structured rejection from the exchange (HTTP status >= 400, or an
    /// `"status": "err"` envelope).
    #[error("API error {code}: {msg}")]
    Api {
        /// Server error code, or the HTTP status when no body code was given.
        code: i64,
        /// Server error message.
        msg: String,
        /// Optional extra payload attached by the server.
        data: Option<serde_json::Value>,
    },

    /// A per-order status entry carried an error string even though the
    /// outer envelope reported success.
    #[error("{0}")]
    Status(String),

    /// The WebSocket client was asked to do work after `close()`.
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl Error {
    /// Builds a validation error for `field`.
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns whether this error is the exchange telling us the signing
    /// wallet is unknown ("User or API Wallet ... does not exist").
    ///
    /// This is the canonical symptom of a signature that does not recover to
    /// a registered address, which in practice means the action bytes did not
    /// match what the server hashed.
    #[must_use]
    pub fn is_wallet_missing(&self) -> bool {
        let msg = match self {
            Self::Api { msg, .. } => msg,
            Self::Status(msg) => msg,
            _ => return false,
        };
        let msg = msg.to_lowercase();
        msg.contains("does not exist") && (msg.contains("wallet") || msg.contains("user"))
    }
}

/// Error body returned by the exchange on HTTP statuses >= 400.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_missing_detection() {
        let err = Error::Status(
            "User or API Wallet 0x1234 does not exist.".to_string(),
        );
        assert!(err.is_wallet_missing());

        let err = Error::Api {
            code: 422,
            msg: "user 0xabcd does not exist".to_string(),
            data: None,
        };
        assert!(err.is_wallet_missing());

        let err = Error::Status("Order must have minimum value of $10.".to_string());
        assert!(!err.is_wallet_missing());

        let err = Error::ConnectionClosed;
        assert!(!err.is_wallet_missing());
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            code: 429,
            msg: "Too many requests".to_string(),
            data: None,
        };
        assert_eq!(err.to_string(), "API error 429: Too many requests");
    }
}
