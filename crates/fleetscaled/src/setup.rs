//! Startup wiring — settings to task set, demand inputs and API client.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use fleetscale_api::{ApiClient, ApiDemand};
use fleetscale_core::{DemandModelKind, HttpClient, Settings};
use fleetscale_demand::{DemandInput, DemandResult, RandomDemand, TaskConfig, TaskFile, TaskSet};

/// Build the remote API client for the configured user.
pub fn api_client(settings: &Settings) -> anyhow::Result<ApiClient> {
    let client = HttpClient::new(&settings.api_address)
        .with_context(|| format!("bad API address {}", settings.api_address))?;
    Ok(ApiClient::new(client, settings.user_id.clone()))
}

/// A demand input for one task, according to the configured demand model.
pub fn demand_input(settings: &Settings, api: &ApiClient) -> Box<dyn DemandInput> {
    match settings.demand_model {
        DemandModelKind::Rng => Box::new(RandomDemand::new(
            settings.demand_delta,
            settings.max_containers,
        )),
        DemandModelKind::Api => Box::new(ApiDemand::new(api.clone())),
    }
}

/// Task definitions from a file if given, otherwise from the API.
pub async fn task_configs(tasks_file: Option<&Path>, api: &ApiClient) -> anyhow::Result<Vec<TaskConfig>> {
    match tasks_file {
        Some(path) => {
            let file = TaskFile::from_file(path)
                .with_context(|| format!("loading tasks from {}", path.display()))?;
            info!(path = %path.display(), count = file.tasks.len(), "tasks loaded from file");
            Ok(file.tasks)
        }
        None => api
            .get_apps()
            .await
            .with_context(|| format!("fetching apps for user {}", api.user_id())),
    }
}

/// Build the task set. Fails on bad definitions or duplicate names.
pub fn build_tasks(settings: &Settings, configs: &[TaskConfig], api: &ApiClient) -> anyhow::Result<TaskSet> {
    let mut make_input = |_name: &str| -> DemandResult<Box<dyn DemandInput>> {
        Ok(demand_input(settings, api))
    };
    let tasks = configs
        .iter()
        .map(|c| c.build(&mut make_input))
        .collect::<DemandResult<Vec<_>>>()
        .context("building tasks")?;
    let set = TaskSet::from_tasks(settings.max_containers, tasks).context("building task set")?;

    info!(
        tasks = set.len(),
        max_containers = set.max_containers(),
        demand_model = %settings.demand_model,
        "task set ready"
    );
    Ok(set)
}
