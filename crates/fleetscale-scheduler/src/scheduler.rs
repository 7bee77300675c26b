//! The scheduler contract every backend implements.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use fleetscale_demand::{Task, TaskSet};

use crate::error::{SchedulerError, SchedulerResult};

/// Boxed future returned by [`Scheduler`] methods.
pub type SchedulerFuture<'a, T = ()> = Pin<Box<dyn Future<Output = SchedulerResult<T>> + Send + 'a>>;

/// Drives an orchestrator toward each task's `demand` and reports back
/// what is actually running.
pub trait Scheduler: Send + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Create or prepare the backend-side representation of a task.
    /// Idempotent.
    fn init_scheduler<'a>(&'a mut self, task: &'a Task) -> SchedulerFuture<'a>;

    /// Converge every scalable task with `demand != requested`, then set
    /// `requested = demand` for the tasks that succeeded. A failure on one
    /// task does not stop the others; failures come back together as
    /// [`SchedulerError::Partial`].
    fn stop_start_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a>;

    /// Refresh every task's `running` from the backend.
    fn count_all_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a>;

    /// Best-effort teardown.
    fn cleanup(&mut self) -> SchedulerFuture<'_>;
}

/// Whether the scheduler should act on this task this cycle.
pub(crate) fn needs_reconcile(task: &Task) -> bool {
    task.is_scalable && task.demand != task.requested
}

/// Turn the list of failed task names into the call's result.
pub(crate) fn partial(failed: Vec<String>) -> SchedulerResult<()> {
    if failed.is_empty() {
        Ok(())
    } else {
        Err(SchedulerError::Partial { failed })
    }
}
