//! Marathon backend — one app per task, scaled by instance count.

use std::collections::BTreeMap;

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fleetscale_core::{HttpClient, HttpError};
use fleetscale_demand::{Task, TaskSet};

use crate::backoff::Backoff;
use crate::error::SchedulerResult;
use crate::scheduler::{Scheduler, SchedulerFuture, needs_reconcile, partial};

const DEFAULT_CPUS: f64 = 0.1;
const DEFAULT_MEM_MB: u32 = 64;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct AppDefinition {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd: Option<String>,
    cpus: f64,
    mem: u32,
    /// Only set when the app is created; updates keep the running count.
    #[serde(skip_serializing_if = "Option::is_none")]
    instances: Option<i32>,
    env: BTreeMap<String, String>,
    container: Container,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Container {
    #[serde(rename = "type")]
    kind: &'static str,
    docker: DockerContainer,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct DockerContainer {
    image: String,
    network: &'static str,
    force_pull_image: bool,
}

#[derive(Debug, Serialize)]
struct ScaleRequest {
    instances: i32,
}

#[derive(Debug, Deserialize)]
struct AppResponse {
    app: AppStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppStatus {
    #[serde(default)]
    tasks_running: i32,
}

#[derive(Debug)]
pub struct MarathonScheduler {
    client: HttpClient,
    backoff: Backoff,
}

impl MarathonScheduler {
    /// `client` must point at the Marathon base address (without `/v2`).
    pub fn new(client: HttpClient) -> Self {
        Self::with_backoff(client, Backoff::default())
    }

    pub fn with_backoff(client: HttpClient, backoff: Backoff) -> Self {
        Self { client, backoff }
    }

    fn app_path(name: &str) -> String {
        format!("/v2/apps/{}", name.trim_start_matches('/'))
    }

    async fn scale(&self, name: &str, instances: i32) -> SchedulerResult<()> {
        let path = format!("{}?force=true", Self::app_path(name));
        self.client
            .send_json(Method::PUT, &path, &ScaleRequest { instances })
            .await?;
        Ok(())
    }

    /// The app's status, or `None` if Marathon does not know it.
    async fn app(&self, name: &str) -> SchedulerResult<Option<AppStatus>> {
        match self.client.get_json::<AppResponse>(&Self::app_path(name)).await {
            Ok(response) => Ok(Some(response.app)),
            Err(HttpError::Status { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn tasks_running(&self, name: &str) -> SchedulerResult<i32> {
        Ok(self.app(name).await?.map_or(0, |app| app.tasks_running))
    }
}

fn app_definition(task: &Task, instances: Option<i32>) -> AppDefinition {
    AppDefinition {
        id: task.name.clone(),
        cmd: task.command.clone(),
        cpus: DEFAULT_CPUS,
        mem: DEFAULT_MEM_MB,
        instances,
        env: task.env.clone(),
        container: Container {
            kind: "DOCKER",
            docker: DockerContainer {
                image: task.image.clone(),
                network: "BRIDGE",
                force_pull_image: false,
            },
        },
    }
}

impl Scheduler for MarathonScheduler {
    fn name(&self) -> &'static str {
        "marathon"
    }

    fn init_scheduler<'a>(&'a mut self, task: &'a Task) -> SchedulerFuture<'a> {
        Box::pin(async move {
            if !task.is_scalable {
                return Ok(());
            }
            // An existing app keeps its instance count; startup adopts it.
            let existing = self.app(&task.name).await?;
            let instances = existing.is_none().then_some(task.requested);

            let path = Self::app_path(&task.name);
            self.client
                .send_json(Method::PUT, &path, &app_definition(task, instances))
                .await?;
            match existing {
                Some(app) => info!(task = %task.name, running = app.tasks_running, "marathon app updated"),
                None => info!(task = %task.name, "marathon app created"),
            }
            Ok(())
        })
    }

    fn stop_start_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a> {
        Box::pin(async move {
            if self.backoff.is_waiting() && !self.backoff.poll_expired() {
                info!("marathon backing off, skipping reconciliation");
                return Ok(());
            }

            let mut failed = Vec::new();
            for t in tasks.iter_mut().filter(|t| needs_reconcile(t)) {
                match self.scale(&t.name, t.demand).await {
                    Ok(()) => {
                        debug!(task = %t.name, from = t.requested, to = t.demand, "marathon scaled");
                        t.requested = t.demand;
                    }
                    Err(e) => {
                        warn!(task = %t.name, demand = t.demand, error = %e, "failed to scale app");
                        failed.push(t.name.clone());
                    }
                }
            }

            if failed.is_empty() {
                self.backoff.reset();
            } else if let Err(e) = self.backoff.start() {
                warn!(error = %e, "marathon backoff not started");
            }
            partial(failed)
        })
    }

    fn count_all_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a> {
        Box::pin(async move {
            let mut failed = Vec::new();
            for t in tasks.iter_mut().filter(|t| t.is_scalable) {
                match self.tasks_running(&t.name).await {
                    Ok(n) => t.running = n,
                    Err(e) => {
                        warn!(task = %t.name, error = %e, "failed to count app tasks");
                        failed.push(t.name.clone());
                    }
                }
            }
            partial(failed)
        })
    }

    fn cleanup(&mut self) -> SchedulerFuture<'_> {
        Box::pin(async move {
            self.backoff.cancel();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscale_demand::{QueueLengthTarget, StaticMetric};

    #[test]
    fn app_definition_shape() {
        let mut task = Task::new(
            "priority1",
            Box::new(StaticMetric(0)),
            Box::new(QueueLengthTarget::new(0, 1)),
        )
        .with_image("example/consumer:latest")
        .with_command("/consume --queue jobs")
        .with_running(2);
        task.env.insert("QUEUE".to_string(), "jobs".to_string());

        let value = serde_json::to_value(app_definition(&task, Some(2))).unwrap();
        assert_eq!(value["id"], "priority1");
        assert_eq!(value["instances"], 2);
        assert_eq!(value["cmd"], "/consume --queue jobs");
        assert_eq!(value["env"]["QUEUE"], "jobs");
        assert_eq!(value["container"]["type"], "DOCKER");
        assert_eq!(value["container"]["docker"]["image"], "example/consumer:latest");
        assert_eq!(value["container"]["docker"]["forcePullImage"], false);

        let update = serde_json::to_value(app_definition(&task, None)).unwrap();
        assert!(update.get("instances").is_none());
    }

    #[test]
    fn missing_tasks_running_is_zero() {
        let response: AppResponse = serde_json::from_str(r#"{"app": {"id": "/p1"}}"#).unwrap();
        assert_eq!(response.app.tasks_running, 0);
    }

    #[test]
    fn app_paths() {
        assert_eq!(MarathonScheduler::app_path("p1"), "/v2/apps/p1");
        assert_eq!(MarathonScheduler::app_path("/p1"), "/v2/apps/p1");
    }
}
