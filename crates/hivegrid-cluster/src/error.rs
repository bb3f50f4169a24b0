//! Error types for signing and remote calls.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use hive_core::ConfigError;

/// Result type alias for remote cluster calls.
pub type CallResult<T> = Result<T, CallError>;

/// Errors raised while signing or verifying a request.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("shared secret is empty")]
    MissingSecret,

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("request body could not be serialized: {0}")]
    Body(#[from] serde_json::Error),

    #[error("content-md5 does not match body")]
    ContentMd5Mismatch,

    #[error("signature does not match")]
    BadSignature,
}

/// Errors from a remote cluster call.
///
/// `Sign`, `InvalidEndpoint`, `Config` and `TlsConfig` are raised before
/// any network I/O. The rest are transport failures and are never retried.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("tls setup failed: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid json response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("remote reported {code}: {message}")]
    Remote { code: String, message: String },
}

impl CallError {
    /// Whether the error happened before any network I/O.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CallError::Sign(_)
                | CallError::InvalidEndpoint { .. }
                | CallError::Config(_)
                | CallError::TlsConfig(_)
                | CallError::Request(_)
        )
    }
}
