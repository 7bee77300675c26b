//! Error types for settings parsing and HTTP calls.

use thiserror::Error;

/// Result type alias for HTTP client operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors raised by [`crate::HttpClient`].
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("http transport error: {0}")]
    Transport(#[from] hyper::Error),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: http::StatusCode, url: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading [`crate::Settings`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("bad value for {name}: {value}")]
    BadValue { name: String, value: String },

    #[error("{0}")]
    Unsupported(String),
}
