//! fleetscale-api — client for the remote fleetscale API.
//!
//! - [`ApiClient::get_apps`] provisions the task list for a user.
//! - [`ApiDemand`] polls per-task demand and plugs in as a
//!   [`DemandInput`](fleetscale_demand::DemandInput).
//! - [`ApiClient::send_state`] reports requested/running counts.
//!
//! ```text
//! GET {api}/apps/{user}             → [App]
//! GET {api}/demand/{user}/{task}    → {"demand": n}
//! PUT {api}/metrics/{user}          ← StatePayload
//! ```

pub mod client;
pub mod error;

pub use client::{ApiApp, ApiClient, ApiDemand, StatePayload, TaskState};
pub use error::{ApiError, ApiResult};
