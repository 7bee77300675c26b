//! fleetscale-demand — the shared model the allocation engine works on.
//!
//! A [`TaskSet`] holds one [`Task`] per workload plus the total container
//! capacity. Each task owns a [`Metric`] (where its demand reading comes
//! from) and a [`Target`] (how a reading turns into a container delta).
//!
//! # Architecture
//!
//! ```text
//! TaskSet (ordered, capacity = max_containers)
//!   └── Task
//!       ├── Box<dyn Metric>   StaticMetric | InputMetric | NsqMetric
//!       │                      └── Box<dyn DemandInput>  RandomDemand | (remote API)
//!       └── Box<dyn Target>   QueueLengthTarget | RemainderTarget
//! ```
//!
//! Task definitions are loaded from TOML (see [`config`]) or from the remote
//! API, and built into tasks once at startup.

pub mod config;
pub mod error;
pub mod input;
pub mod metric;
pub mod target;
pub mod task;
pub mod task_set;

pub use config::{MetricConfig, TargetConfig, TaskConfig, TaskFile};
pub use error::{DemandError, DemandResult};
pub use input::{DemandFuture, DemandInput, RandomDemand};
pub use metric::{InputMetric, Metric, MetricFuture, NsqMetric, StaticMetric};
pub use target::{QueueLengthTarget, RemainderTarget, Target};
pub use task::Task;
pub use task_set::TaskSet;
