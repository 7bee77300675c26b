//! Remote API error types.

use thiserror::Error;

use fleetscale_core::HttpError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("error response from API: {0}")]
    Status(http::StatusCode),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;
