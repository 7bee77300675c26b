//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;

use fleetscale_core::HttpError;

/// Errors that can occur while driving a backend.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task not known to the scheduler: {0}")]
    UnknownTask(String),

    #[error("failed to reconcile tasks: {}", .failed.join(", "))]
    Partial { failed: Vec<String> },

    #[error("backend returned an unexpected response: {0}")]
    Backend(String),

    #[error(transparent)]
    Backoff(#[from] BackoffError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised by [`crate::Backoff`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackoffError {
    #[error("already backing off")]
    AlreadyWaiting,

    #[error("exceeded max backoff: next wait {next:?} is over {max:?}")]
    Exhausted { next: Duration, max: Duration },
}
