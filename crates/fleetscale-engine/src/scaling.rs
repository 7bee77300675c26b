//! Scaling calculation — the two-phase allocation pass.
//!
//! Reads the current metric of every scalable task, then rewrites `demand`
//! so that higher-priority tasks are served first out of the shared
//! capacity pool. Pure in-memory computation: nothing here can fail.

use tracing::{debug, info, warn};

use fleetscale_demand::TaskSet;

/// Runs allocation passes over a task set and keeps a pass counter for
/// the log.
#[derive(Debug, Default)]
pub struct Engine {
    passes: u64,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run one allocation pass. Returns whether any task's demand changed.
    pub fn run(&mut self, tasks: &mut TaskSet) -> bool {
        self.passes += 1;
        let changed = scaling_calculation(tasks);

        info!(
            pass = self.passes,
            changed,
            available = tasks.check_capacity(),
            running = tasks.total_running(),
            demand = ?tasks
                .iter()
                .map(|t| (t.name.as_str(), t.demand))
                .collect::<Vec<_>>(),
            "allocation pass complete"
        );
        changed
    }
}

/// Decide the new `demand` of every scalable task.
///
/// Phase 1 shrinks tasks that want to shrink, lowest priority first, so
/// the capacity they free is visible to phase 2. Phase 2 grows tasks
/// highest priority first, preempting strictly lower-priority tasks when
/// the pool runs short. Tasks with an operation in flight
/// (`running != requested`) are left alone throughout.
pub fn scaling_calculation(tasks: &mut TaskSet) -> bool {
    let mut changed = false;

    for t in tasks.iter_mut().filter(|t| t.is_scalable) {
        t.update_ideal();
        debug!(
            task = %t.name,
            priority = t.priority,
            ideal = t.ideal_containers,
            running = t.running,
            requested = t.requested,
            "ideal size"
        );
    }

    let mut available = tasks.check_capacity();
    debug!(available, "available capacity");

    // Phase 1: scale down, lowest priority first.
    tasks.priority_sort(true);
    for t in tasks.iter_mut() {
        if !t.is_scalable || t.demand <= t.min_containers {
            continue;
        }
        if t.is_in_flight() {
            debug!(task = %t.name, running = t.running, requested = t.requested, "already scaling");
            continue;
        }

        let delta = t.scale_down_count();
        if delta < 0 {
            t.demand += delta;
            available -= delta;
            changed = true;
            debug!(task = %t.name, by = delta, demand = t.demand, available, "scaling down");
        }
    }

    // Phase 2: scale up, highest priority first.
    tasks.priority_sort(false);
    let order = tasks.tasks_mut();
    for p in 0..order.len() {
        let (head, tail) = order.split_at_mut(p + 1);
        let t = &mut head[p];

        if !t.is_scalable {
            continue;
        }
        if t.is_in_flight() {
            debug!(task = %t.name, running = t.running, requested = t.requested, "already scaling");
            continue;
        }

        let wanted = t.scale_up_count();
        if wanted <= 0 {
            continue;
        }
        debug!(task = %t.name, wanted, available, "would like to scale up");

        if available < wanted && !t.is_remainder() {
            debug!(task = %t.name, shortfall = wanted - available, "looking for capacity from lower priorities");
            let mut freed = available;

            // Lowest priority end inward, stopping just after this task.
            for victim in tail.iter_mut().rev() {
                if freed >= wanted {
                    break;
                }
                if victim.priority <= t.priority || !victim.is_scalable || victim.is_in_flight() {
                    continue;
                }

                let take = victim.can_scale_down().min(wanted - freed);
                if take > 0 {
                    victim.demand -= take;
                    freed += take;
                    available += take;
                    changed = true;
                    debug!(
                        task = %victim.name,
                        priority = victim.priority,
                        by = -take,
                        demand = victim.demand,
                        for_task = %t.name,
                        "preempting"
                    );
                }
            }
        }

        let grant = wanted.min(available);
        if grant < wanted {
            debug!(task = %t.name, wanted, grant, "can only partially scale up");
        }
        if grant <= 0 {
            continue;
        }

        changed = true;
        available -= grant;
        t.demand += grant;
        if t.demand > t.max_containers {
            warn!(
                task = %t.name,
                demand = t.demand,
                max = t.max_containers,
                "limiting task to its configured max"
            );
            available += t.demand - t.max_containers;
            t.demand = t.max_containers;
        }
        debug!(task = %t.name, by = grant, demand = t.demand, available, "scaling up");
    }

    changed
}
