//! fleetscale-engine — priority-based capacity allocation.
//!
//! Given a [`TaskSet`](fleetscale_demand::TaskSet) with fresh metric
//! readings, decides the new `demand` of every scalable task without
//! exceeding the set's capacity.
//!
//! # Allocation Algorithm
//!
//! ```text
//! for each scalable task:
//!     ideal = running + target.delta(metric.current())
//! available = max_containers - sum(demand)
//!
//! // phase 1: lowest priority first
//! for each task, reverse priority order:
//!     skip if pinned, at min, or in flight (running != requested)
//!     if scale_down_count() < 0: shrink, credit available
//!
//! // phase 2: highest priority first
//! for each task, priority order:
//!     skip if pinned or in flight
//!     want = scale_up_count()
//!     if available < want and not remainder:
//!         take the shortfall from strictly lower-priority tasks,
//!         lowest priority first, up to can_scale_down() each
//!     grow by min(want, available), clamped to max_containers
//! ```
//!
//! A task that already has an operation in flight is never given a new
//! demand, neither for itself nor as a preemption victim.

pub mod scaling;

pub use scaling::{Engine, scaling_calculation};
