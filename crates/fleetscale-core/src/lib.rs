//! fleetscale-core — settings and HTTP plumbing shared by every crate.
//!
//! - [`Settings`] is read from `FLEETSCALE_*` environment variables and
//!   validated into typed backend / demand-model selections.
//! - [`HttpClient`] is a minimal hyper-based HTTP/1.1 client for `http://`
//!   and `unix://` endpoints (remote API, Marathon, Docker, nsqd).

pub mod error;
pub mod http;
pub mod settings;

pub use error::{HttpError, HttpResult, SettingsError};
pub use http::{HttpClient, HttpResponse, with_query};
pub use settings::{DemandModelKind, SchedulerKind, Settings};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
