//! Task — one scalable (or pinned) workload definition.

use std::collections::BTreeMap;

use crate::metric::{Metric, StaticMetric};
use crate::target::{QueueLengthTarget, Target};

/// A workload and its scaling state.
///
/// Counts are signed so that deltas can be carried through the engine
/// without casts. `running` is written by the scheduler adapter, `demand`
/// by the engine, and `requested` by the adapter after acting on `demand`.
#[derive(Debug)]
pub struct Task {
    pub name: String,
    /// Lower value = higher priority.
    pub priority: i32,
    pub is_scalable: bool,
    pub min_containers: i32,
    pub max_containers: i32,
    pub running: i32,
    pub requested: i32,
    pub demand: i32,
    /// `running + target.delta(metric.current())` from the last pass.
    pub ideal_containers: i32,
    pub image: String,
    pub command: Option<String>,
    pub env: BTreeMap<String, String>,
    metric: Box<dyn Metric>,
    target: Box<dyn Target>,
}

impl Task {
    pub fn new(name: impl Into<String>, metric: Box<dyn Metric>, target: Box<dyn Target>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            is_scalable: true,
            min_containers: 0,
            max_containers: 0,
            running: 0,
            requested: 0,
            demand: 0,
            ideal_containers: 0,
            image: String::new(),
            command: None,
            env: BTreeMap::new(),
            metric,
            target,
        }
    }

    /// A task the engine never touches, e.g. the autoscaler's own container.
    pub fn pinned(name: impl Into<String>, count: i32) -> Self {
        Self::new(
            name,
            Box::new(StaticMetric(0)),
            Box::new(QueueLengthTarget::new(0, 1)),
        )
        .with_bounds(count, count)
        .with_running(count)
        .non_scalable()
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_bounds(mut self, min: i32, max: i32) -> Self {
        self.min_containers = min;
        self.max_containers = max;
        self
    }

    /// Set `running`, `requested` and `demand` to the same settled count.
    pub fn with_running(mut self, count: i32) -> Self {
        self.running = count;
        self.requested = count;
        self.demand = count;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn non_scalable(mut self) -> Self {
        self.is_scalable = false;
        self
    }

    pub fn metric(&self) -> &dyn Metric {
        self.metric.as_ref()
    }

    pub fn metric_mut(&mut self) -> &mut dyn Metric {
        self.metric.as_mut()
    }

    /// A scale operation was issued and not yet observed complete.
    pub fn is_in_flight(&self) -> bool {
        self.running != self.requested
    }

    /// Recompute and cache the metric-driven ideal size.
    pub fn update_ideal(&mut self) -> i32 {
        let delta = self.target.delta(self.metric.current());
        self.ideal_containers = self.running.saturating_add(delta);
        self.ideal_containers
    }

    /// How many containers this task could grow by right now (>= 0).
    pub fn scale_up_count(&self) -> i32 {
        let wanted = self.ideal_containers.saturating_sub(self.demand);
        let headroom = self.max_containers - self.requested;
        wanted.min(headroom).max(0)
    }

    /// How many containers this task should shed right now (<= 0).
    ///
    /// Never takes `demand` below `min_containers`.
    pub fn scale_down_count(&self) -> i32 {
        let delta = self.ideal_containers.saturating_sub(self.demand);
        if delta >= 0 {
            return 0;
        }
        delta.max(self.min_containers - self.demand).min(0)
    }

    /// How many containers could be taken away without going below
    /// `min_containers`, regardless of what the task itself wants.
    pub fn can_scale_down(&self) -> i32 {
        (self.demand - self.min_containers).max(0)
    }

    pub fn is_remainder(&self) -> bool {
        self.target.is_remainder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::RemainderTarget;

    fn queue_task(reading: i32, length: i32) -> Task {
        Task::new(
            "worker",
            Box::new(StaticMetric(reading)),
            Box::new(QueueLengthTarget::new(length, 10)),
        )
        .with_bounds(1, 8)
    }

    #[test]
    fn ideal_is_running_plus_delta() {
        let mut t = queue_task(7, 3).with_running(2);
        assert_eq!(t.update_ideal(), 6);
        assert_eq!(t.ideal_containers, 6);
    }

    #[test]
    fn scale_up_is_bounded_by_max_minus_requested() {
        let mut t = queue_task(20, 0).with_running(5);
        t.update_ideal(); // 5 + 10 = 15
        assert_eq!(t.scale_up_count(), 3);
    }

    #[test]
    fn scale_up_is_never_negative() {
        let mut t = queue_task(0, 5).with_running(4);
        t.update_ideal();
        assert_eq!(t.scale_up_count(), 0);

        // Already above max.
        let mut t = queue_task(20, 0).with_running(9);
        t.update_ideal();
        assert_eq!(t.scale_up_count(), 0);
    }

    #[test]
    fn scale_down_respects_min() {
        let mut t = queue_task(0, 5).with_running(4);
        t.update_ideal(); // 4 - 5 = -1
        assert_eq!(t.scale_down_count(), -3);
    }

    #[test]
    fn scale_down_is_zero_when_growing() {
        let mut t = queue_task(9, 5).with_running(4);
        t.update_ideal();
        assert_eq!(t.scale_down_count(), 0);
    }

    #[test]
    fn scale_down_is_zero_at_min() {
        let mut t = queue_task(0, 5).with_running(1);
        t.update_ideal();
        assert_eq!(t.scale_down_count(), 0);
    }

    #[test]
    fn extreme_targets_saturate() {
        let mut t = Task::new(
            "worker",
            Box::new(StaticMetric(0)),
            Box::new(QueueLengthTarget::new(i32::MAX, i32::MAX)),
        )
        .with_bounds(1, 8)
        .with_running(0);
        t.demand = 5;
        assert_eq!(t.update_ideal(), -i32::MAX);
        assert_eq!(t.scale_up_count(), 0);
        assert_eq!(t.scale_down_count(), -4);

        let mut t = Task::new(
            "worker",
            Box::new(StaticMetric(i32::MAX)),
            Box::new(QueueLengthTarget::new(0, i32::MAX)),
        )
        .with_bounds(0, 8)
        .with_running(3);
        t.demand = -1;
        t.update_ideal();
        assert_eq!(t.scale_up_count(), 5);
    }

    #[test]
    fn can_scale_down_ignores_wishes() {
        let mut t = queue_task(100, 0).with_running(6);
        t.update_ideal();
        assert_eq!(t.scale_down_count(), 0);
        assert_eq!(t.can_scale_down(), 5);

        let t = queue_task(0, 0).with_running(0);
        assert_eq!(t.can_scale_down(), 0);
    }

    #[test]
    fn in_flight_when_running_differs_from_requested() {
        let mut t = queue_task(0, 0).with_running(3);
        assert!(!t.is_in_flight());
        t.requested = 5;
        assert!(t.is_in_flight());
    }

    #[test]
    fn remainder_comes_from_target() {
        let t = Task::new("filler", Box::new(StaticMetric(0)), Box::new(RemainderTarget::new(9)));
        assert!(t.is_remainder());
        assert!(!queue_task(0, 0).is_remainder());
    }

    #[test]
    fn pinned_task_is_not_scalable() {
        let t = Task::pinned("fleetscale", 1);
        assert!(!t.is_scalable);
        assert_eq!((t.running, t.requested, t.demand), (1, 1, 1));
        assert_eq!((t.min_containers, t.max_containers), (1, 1));
    }
}
