//! Docker backend — one container per instance via the Engine remote API.
//!
//! Containers are labelled with [`TASK_LABEL`] so they can be counted and
//! removed again without any local bookkeeping surviving a restart.

use std::collections::{BTreeMap, HashMap};

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fleetscale_core::{HttpClient, with_query};
use fleetscale_demand::{Task, TaskSet};

use crate::backoff::Backoff;
use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::{Scheduler, SchedulerFuture, needs_reconcile, partial};

/// Label carrying the task name on every container we start.
pub const TASK_LABEL: &str = "fleetscale.task";

/// Seconds Docker waits for a container to exit before killing it.
const STOP_TIMEOUT_SECS: u32 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateContainer<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd: Option<Vec<&'a str>>,
    env: Vec<String>,
    labels: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerSummary {
    id: String,
}

#[derive(Debug)]
pub struct DockerScheduler {
    client: HttpClient,
    pull_images: bool,
    /// Container ids we know of, per task, oldest first.
    containers: HashMap<String, Vec<String>>,
    backoff: Backoff,
}

impl DockerScheduler {
    /// `client` must point at the Docker daemon (`unix://` or `http://`).
    pub fn new(client: HttpClient, pull_images: bool) -> Self {
        Self::with_backoff(client, pull_images, Backoff::default())
    }

    pub fn with_backoff(client: HttpClient, pull_images: bool, backoff: Backoff) -> Self {
        Self {
            client,
            pull_images,
            containers: HashMap::new(),
            backoff,
        }
    }

    async fn pull(&self, image: &str) -> SchedulerResult<()> {
        let (name, tag) = split_image(image);
        let path = with_query("/images/create", &[("fromImage", name), ("tag", tag)]);
        info!(%image, "pulling image");
        let response = self.client.send(Method::POST, &path, None).await?;
        check_status(&response.status, &[StatusCode::OK], &path)
    }

    async fn start_one(&mut self, task: &Task) -> SchedulerResult<String> {
        let env = task.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let body = CreateContainer {
            image: &task.image,
            cmd: task
                .command
                .as_deref()
                .map(|c| c.split_whitespace().collect()),
            env,
            labels: BTreeMap::from([(TASK_LABEL, task.name.as_str())]),
        };

        let response = self
            .client
            .send_json(Method::POST, "/containers/create", &body)
            .await?;
        let created: Created = response.json()?;

        let path = format!("/containers/{}/start", created.id);
        let response = self.client.send(Method::POST, &path, None).await?;
        check_status(
            &response.status,
            &[StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED],
            &path,
        )?;

        debug!(task = %task.name, id = %created.id, "container started");
        self.containers
            .entry(task.name.clone())
            .or_default()
            .push(created.id.clone());
        Ok(created.id)
    }

    async fn stop_one(&mut self, task: &str) -> SchedulerResult<()> {
        let id = self
            .containers
            .get_mut(task)
            .and_then(|ids| ids.pop())
            .ok_or_else(|| SchedulerError::UnknownTask(task.to_string()))?;
        self.remove(&id).await?;
        debug!(%task, %id, "container stopped");
        Ok(())
    }

    async fn remove(&self, id: &str) -> SchedulerResult<()> {
        let path = format!("/containers/{id}/stop?t={STOP_TIMEOUT_SECS}");
        let response = self.client.send(Method::POST, &path, None).await?;
        check_status(
            &response.status,
            &[StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED, StatusCode::NOT_FOUND],
            &path,
        )?;

        let path = format!("/containers/{id}?force=true");
        let response = self.client.send(Method::DELETE, &path, None).await?;
        check_status(
            &response.status,
            &[StatusCode::NO_CONTENT, StatusCode::NOT_FOUND],
            &path,
        )
    }

    /// Move one task from `requested` to `demand`, returning the count
    /// actually reached when a call fails part way.
    async fn scale(&mut self, task: &Task) -> Result<(), (i32, SchedulerError)> {
        let mut reached = task.requested;
        while reached < task.demand {
            self.start_one(task).await.map_err(|e| (reached, e))?;
            reached += 1;
        }
        while reached > task.demand {
            self.stop_one(&task.name).await.map_err(|e| (reached, e))?;
            reached -= 1;
        }
        Ok(())
    }

    async fn list(&self, task: &str) -> SchedulerResult<Vec<String>> {
        let filters = serde_json::json!({ "label": [format!("{TASK_LABEL}={task}")] }).to_string();
        let path = with_query("/containers/json", &[("filters", filters.as_str())]);
        let summaries: Vec<ContainerSummary> = self.client.get_json(&path).await?;
        Ok(summaries.into_iter().map(|c| c.id).collect())
    }

    fn backing_off(&mut self) -> bool {
        self.backoff.is_waiting() && !self.backoff.poll_expired()
    }

    fn record(&mut self, ok: bool) {
        if ok {
            self.backoff.reset();
        } else if let Err(e) = self.backoff.start() {
            warn!(error = %e, "docker backoff not started");
        }
    }
}

fn split_image(image: &str) -> (&str, &str) {
    // A colon after the last slash separates the tag; one before it is a
    // registry port.
    match image.rfind(':') {
        Some(i) if !image[i..].contains('/') => (&image[..i], &image[i + 1..]),
        _ => (image, "latest"),
    }
}

fn check_status(status: &StatusCode, ok: &[StatusCode], path: &str) -> SchedulerResult<()> {
    if status.is_success() || ok.contains(status) {
        Ok(())
    } else {
        Err(SchedulerError::Backend(format!("{path} returned {status}")))
    }
}

impl Scheduler for DockerScheduler {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn init_scheduler<'a>(&'a mut self, task: &'a Task) -> SchedulerFuture<'a> {
        Box::pin(async move {
            if self.pull_images && task.is_scalable && !task.image.is_empty() {
                self.pull(&task.image).await?;
            }
            let ids = self.list(&task.name).await?;
            debug!(task = %task.name, existing = ids.len(), "docker init");
            self.containers.insert(task.name.clone(), ids);
            Ok(())
        })
    }

    fn stop_start_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a> {
        Box::pin(async move {
            if self.backing_off() {
                info!("docker backing off, skipping reconciliation");
                return Ok(());
            }

            let mut failed = Vec::new();
            for t in tasks.iter_mut().filter(|t| needs_reconcile(t)) {
                match self.scale(t).await {
                    Ok(()) => {
                        debug!(task = %t.name, from = t.requested, to = t.demand, "docker scaled");
                        t.requested = t.demand;
                    }
                    Err((reached, e)) => {
                        warn!(task = %t.name, demand = t.demand, reached, error = %e, "failed to scale task");
                        t.requested = reached;
                        failed.push(t.name.clone());
                    }
                }
            }

            self.record(failed.is_empty());
            partial(failed)
        })
    }

    fn count_all_tasks<'a>(&'a mut self, tasks: &'a mut TaskSet) -> SchedulerFuture<'a> {
        Box::pin(async move {
            let mut failed = Vec::new();
            for t in tasks.iter_mut().filter(|t| t.is_scalable) {
                match self.list(&t.name).await {
                    Ok(ids) => {
                        t.running = ids.len() as i32;
                        self.containers.insert(t.name.clone(), ids);
                    }
                    Err(e) => {
                        warn!(task = %t.name, error = %e, "failed to count containers");
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
            let mut failed = Vec::new();
            let containers = std::mem::take(&mut self.containers);
            for (task, ids) in containers {
                for id in ids {
                    if let Err(e) = self.remove(&id).await {
                        warn!(%task, %id, error = %e, "failed to remove container");
                        failed.push(task.clone());
                    }
                }
            }
            failed.dedup();
            partial(failed)
        })
    }
}
