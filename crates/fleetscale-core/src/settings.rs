//! Environment settings for the control loop.
//!
//! Every setting has a default; an empty variable counts as unset. Boolean
//! flags are on only when the value is exactly `true`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::SettingsError;

pub const ENV_SCHEDULER: &str = "FLEETSCALE_SCHEDULER";
pub const ENV_DEMAND_MODEL: &str = "FLEETSCALE_DEMAND_MODEL";
pub const ENV_USER_ID: &str = "FLEETSCALE_USER_ID";
pub const ENV_SEND_METRICS: &str = "FLEETSCALE_SEND_METRICS_TO_API";
pub const ENV_DEMAND_DELTA: &str = "FLEETSCALE_DEMAND_DELTA";
pub const ENV_MAX_CONTAINERS: &str = "FLEETSCALE_MAXIMUM_CONTAINERS";
pub const ENV_DEMAND_INTERVAL_MS: &str = "FLEETSCALE_DEMAND_CHANGE_INTERVAL_MS";
pub const ENV_PULL_IMAGES: &str = "FLEETSCALE_PULL_IMAGES";
pub const ENV_API_ADDRESS: &str = "FLEETSCALE_API_ADDRESS";
pub const ENV_DOCKER_HOST: &str = "FLEETSCALE_DOCKER_HOST";
pub const ENV_MARATHON_ADDRESS: &str = "FLEETSCALE_MARATHON_ADDRESS";
pub const ENV_REPORT_EVERY: &str = "FLEETSCALE_REPORT_EVERY";

/// Orchestration backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerKind {
    Docker,
    Marathon,
    Toy,
}

impl FromStr for SchedulerKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOCKER" => Ok(Self::Docker),
            "MARATHON" => Ok(Self::Marathon),
            "TOY" => Ok(Self::Toy),
            "COMPOSE" | "ECS" | "KUBERNETES" | "MESOS" | "NOMAD" => Err(
                SettingsError::Unsupported(format!("scheduling with {s} is not yet supported")),
            ),
            other => Err(SettingsError::BadValue {
                name: ENV_SCHEDULER.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Docker => "DOCKER",
            Self::Marathon => "MARATHON",
            Self::Toy => "TOY",
        };
        f.write_str(name)
    }
}

/// Where demand readings come from for tasks using the `input` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemandModelKind {
    /// Poll the remote API.
    Api,
    /// Local random walk.
    Rng,
}

impl FromStr for DemandModelKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "API" => Ok(Self::Api),
            "RNG" => Ok(Self::Rng),
            "CONSUL" => Err(SettingsError::Unsupported(
                "demand metric from Consul is not yet supported".to_string(),
            )),
            other => Err(SettingsError::BadValue {
                name: ENV_DEMAND_MODEL.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for DemandModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Api => "API",
            Self::Rng => "RNG",
        })
    }
}

/// Validated settings consumed by the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub scheduler: SchedulerKind,
    pub demand_model: DemandModelKind,
    pub user_id: String,
    pub send_metrics: bool,
    /// Largest step of the random-walk demand model.
    pub demand_delta: i32,
    /// Total container capacity shared by all tasks.
    pub max_containers: i32,
    #[serde(with = "duration_ms")]
    pub demand_interval: Duration,
    pub pull_images: bool,
    pub api_address: String,
    pub docker_host: String,
    pub marathon_address: String,
    /// Cycles between state reports sent to the API.
    pub report_every: u32,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, default: &str| -> String {
            lookup(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let demand_interval_ms: u64 = parse_number(ENV_DEMAND_INTERVAL_MS, &get(ENV_DEMAND_INTERVAL_MS, "3000"))?;

        Ok(Self {
            scheduler: get(ENV_SCHEDULER, "DOCKER").parse()?,
            demand_model: get(ENV_DEMAND_MODEL, "API").parse()?,
            user_id: get(ENV_USER_ID, "5k5gk"),
            send_metrics: get(ENV_SEND_METRICS, "true") == "true",
            demand_delta: parse_number(ENV_DEMAND_DELTA, &get(ENV_DEMAND_DELTA, "3"))?,
            max_containers: parse_number(ENV_MAX_CONTAINERS, &get(ENV_MAX_CONTAINERS, "9"))?,
            demand_interval: Duration::from_millis(demand_interval_ms),
            pull_images: get(ENV_PULL_IMAGES, "true") == "true",
            api_address: get(ENV_API_ADDRESS, "http://127.0.0.1:8000"),
            docker_host: get(ENV_DOCKER_HOST, "unix:///var/run/docker.sock"),
            marathon_address: get(ENV_MARATHON_ADDRESS, "http://127.0.0.1:8080"),
            report_every: parse_number(ENV_REPORT_EVERY, &get(ENV_REPORT_EVERY, "5"))?,
        })
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse::<T>().map_err(|_| SettingsError::BadValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
