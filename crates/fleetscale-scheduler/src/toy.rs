//! Toy scheduler — in-memory, every request is fulfilled instantly.

use tracing::debug;

use fleetscale_demand::{Task, TaskSet};

use crate::scheduler::{Scheduler, SchedulerFuture, needs_reconcile};

#[derive(Debug, Default)]
pub struct ToyScheduler;

impl ToyScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ToyScheduler {
    fn name(&self) -> &'static str {
        "toy"
    }

    fn init_scheduler<'a>(&'a mut self, task: &'a Task) -> SchedulerFuture<'a> {
        Box::pin(async move {
            debug!(task = %task.name, "toy init");
            Ok(())
        })
    }

    fn stop_start_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a> {
        Box::pin(async move {
            for t in tasks.iter_mut().filter(|t| needs_reconcile(t)) {
                debug!(task = %t.name, from = t.requested, to = t.demand, "toy scale");
                t.requested = t.demand;
            }
            Ok(())
        })
    }

    fn count_all_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a> {
        Box::pin(async move {
            for t in tasks.iter_mut() {
                t.running = t.requested;
            }
            Ok(())
        })
    }

    fn cleanup(&mut self) -> SchedulerFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscale_demand::{QueueLengthTarget, StaticMetric};

    fn task(name: &str) -> Task {
        Task::new(
            name,
            Box::new(StaticMetric(0)),
            Box::new(QueueLengthTarget::new(0, 1)),
        )
        .with_bounds(0, 9)
    }

    #[tokio::test]
    async fn requested_follows_demand_and_running_follows_requested() {
        let mut t = task("anything").with_running(3);
        t.demand = 8;
        let mut set = TaskSet::from_tasks(9, [t, Task::pinned("fleetscale", 1)]).unwrap();

        let mut s = ToyScheduler::new();
        s.init_scheduler(set.get("anything").unwrap()).await.unwrap();
        s.stop_start_tasks(&mut set).await.unwrap();

        let t = set.get("anything").unwrap();
        assert_eq!((t.running, t.requested, t.demand), (3, 8, 8));

        s.count_all_tasks(&mut set).await.unwrap();
        for t in set.iter() {
            assert_eq!(t.running, t.requested);
            assert_eq!(t.running, t.demand);
        }
        s.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn pinned_tasks_are_not_scaled() {
        let mut pinned = Task::pinned("fleetscale", 1);
        pinned.demand = 4;
        let mut set = TaskSet::from_tasks(9, [pinned]).unwrap();

        ToyScheduler::new().stop_start_tasks(&mut set).await.unwrap();
        assert_eq!(set.get("fleetscale").unwrap().requested, 1);
    }
}
