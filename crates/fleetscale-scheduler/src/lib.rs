//! fleetscale-scheduler — backend adapters that make reality match demand.
//!
//! Every backend implements [`Scheduler`]. The control loop calls
//! [`Scheduler::count_all_tasks`] to refresh `running`, runs the allocation
//! engine, then [`Scheduler::stop_start_tasks`] to act on the new `demand`.
//!
//! # Backends
//!
//! ```text
//! ToyScheduler       in memory, requests are fulfilled instantly
//! DockerScheduler    Engine API, one labelled container per instance
//! MarathonScheduler  /v2/apps, one app per task scaled by instance count
//! ```
//!
//! HTTP backends hold a [`Backoff`]: after a failed reconciliation they skip
//! further reconciliation until the backoff timer fires.

pub mod backoff;
pub mod docker;
pub mod error;
pub mod marathon;
pub mod scheduler;
pub mod toy;

pub use backoff::Backoff;
pub use docker::DockerScheduler;
pub use error::{BackoffError, SchedulerError, SchedulerResult};
pub use marathon::MarathonScheduler;
pub use scheduler::{Scheduler, SchedulerFuture};
pub use toy::ToyScheduler;

use std::time::Duration;

use fleetscale_core::{HttpClient, SchedulerKind, Settings};

/// Image pulls answer only once the pull is done.
const DOCKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the backend selected in the settings.
pub fn from_settings(settings: &Settings) -> SchedulerResult<Box<dyn Scheduler>> {
    let scheduler: Box<dyn Scheduler> = match settings.scheduler {
        SchedulerKind::Toy => Box::new(ToyScheduler::new()),
        SchedulerKind::Docker => Box::new(DockerScheduler::new(
            HttpClient::new(&settings.docker_host)?.with_timeout(DOCKER_TIMEOUT),
            settings.pull_images,
        )),
        SchedulerKind::Marathon => Box::new(MarathonScheduler::new(HttpClient::new(
            &settings.marathon_address,
        )?)),
    };
    Ok(scheduler)
}
