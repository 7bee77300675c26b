//! Error types for the demand model.

use thiserror::Error;

use fleetscale_core::HttpError;

/// Result type alias for demand model operations.
pub type DemandResult<T> = Result<T, DemandError>;

/// Errors raised while building tasks or reading demand.
#[derive(Debug, Error)]
pub enum DemandError {
    #[error("duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("invalid bounds for task {name}: min {min}, max {max}")]
    InvalidBounds { name: String, min: i32, max: i32 },

    #[error("invalid task definition {name}: {reason}")]
    InvalidTask { name: String, reason: String },

    #[error("failed to read task file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse task file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("demand input error: {0}")]
    Input(String),

    #[error(transparent)]
    Http(#[from] HttpError),
}
