//! Task definitions — TOML task files and the builder from config to [`Task`].
//!
//! ```toml
//! [[task]]
//! name = "priority1"
//! image = "example/consumer:latest"
//! priority = 1
//! min_containers = 1
//! max_containers = 9
//! target = { type = "queue_length", length = 5, step = 3 }
//! metric = { type = "nsq", address = "http://127.0.0.1:4151", topic = "jobs", channel = "work" }
//!
//! [[task]]
//! name = "priority2"
//! image = "example/batch:latest"
//! priority = 2
//! max_containers = 9
//! target = { type = "remainder" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fleetscale_core::HttpClient;

use crate::error::{DemandError, DemandResult};
use crate::input::DemandInput;
use crate::metric::{InputMetric, Metric, NsqMetric, StaticMetric};
use crate::target::{QueueLengthTarget, RemainderTarget, Target};
use crate::task::Task;

/// A parsed task file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskFile {
    #[serde(rename = "task", default)]
    pub tasks: Vec<TaskConfig>,
}

/// One task definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskConfig {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub priority: i32,
    #[serde(default)]
    pub min_containers: i32,
    pub max_containers: i32,
    #[serde(default = "default_true")]
    pub scalable: bool,
    pub target: TargetConfig,
    /// Defaults to [`MetricConfig::Input`].
    #[serde(default)]
    pub metric: Option<MetricConfig>,
}

/// Which target policy a task uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    QueueLength {
        length: i32,
        #[serde(default = "default_step")]
        step: i32,
    },
    Remainder,
}

/// Where a task's metric reading comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricConfig {
    /// The configured demand model (random walk or remote API).
    Input,
    Static { value: i32 },
    Nsq {
        address: String,
        topic: String,
        channel: String,
    },
}

fn default_true() -> bool {
    true
}

fn default_step() -> i32 {
    1
}

impl TaskFile {
    pub fn from_file(path: &Path) -> DemandResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DemandError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> DemandResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl TaskConfig {
    /// Build a task. `make_input` is called only for tasks using the
    /// `input` metric, with the task's name.
    pub fn build<F>(&self, make_input: &mut F) -> DemandResult<Task>
    where
        F: FnMut(&str) -> DemandResult<Box<dyn DemandInput>>,
    {
        if self.name.trim().is_empty() {
            return Err(DemandError::InvalidTask {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }

        let target: Box<dyn Target> = match self.target {
            TargetConfig::QueueLength { length, step } => {
                if step < 1 {
                    return Err(DemandError::InvalidTask {
                        name: self.name.clone(),
                        reason: format!("step must be at least 1, got {step}"),
                    });
                }
                Box::new(QueueLengthTarget::new(length, step))
            }
            TargetConfig::Remainder => Box::new(RemainderTarget::new(self.max_containers)),
        };

        let metric: Box<dyn Metric> = match self.metric.as_ref().unwrap_or(&MetricConfig::Input) {
            MetricConfig::Input => Box::new(InputMetric::new(self.name.clone(), make_input(&self.name)?)),
            MetricConfig::Static { value } => Box::new(StaticMetric(*value)),
            MetricConfig::Nsq {
                address,
                topic,
                channel,
            } => Box::new(NsqMetric::new(HttpClient::new(address)?, topic, channel)),
        };

        let mut task = Task::new(self.name.clone(), metric, target)
            .with_priority(self.priority)
            .with_bounds(self.min_containers, self.max_containers)
            .with_image(self.image.clone());
        task.command = self.command.clone();
        task.env = self.env.clone();
        task.is_scalable = self.scalable;
        Ok(task)
    }
}
