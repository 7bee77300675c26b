//! Remote API client.

use std::collections::BTreeMap;

use http::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fleetscale_core::{HttpClient, epoch_secs};
use fleetscale_demand::{
    DemandFuture, DemandInput, MetricConfig, TargetConfig, TaskConfig, TaskSet,
};

use crate::error::{ApiError, ApiResult};

/// An app definition as served by `GET /apps/{user}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiApp {
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
    #[serde(default)]
    pub metric: Option<MetricConfig>,
}

fn default_true() -> bool {
    true
}

impl From<ApiApp> for TaskConfig {
    fn from(app: ApiApp) -> Self {
        TaskConfig {
            name: app.name,
            image: app.image,
            command: app.command,
            env: app.env,
            priority: app.priority,
            min_containers: app.min_containers,
            max_containers: app.max_containers,
            scalable: app.scalable,
            target: app.target,
            metric: app.metric,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DemandResponse {
    demand: i32,
}

/// Body of the periodic state report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    /// Unix seconds.
    pub created_at: u64,
    pub tasks: Vec<TaskState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskState {
    pub app: String,
    pub priority: i32,
    pub requested: i32,
    pub running: i32,
    pub demand: i32,
}

impl StatePayload {
    pub fn from_tasks(tasks: &TaskSet, created_at: u64) -> Self {
        Self {
            created_at,
            tasks: tasks
                .iter()
                .map(|t| TaskState {
                    app: t.name.clone(),
                    priority: t.priority,
                    requested: t.requested,
                    running: t.running,
                    demand: t.demand,
                })
                .collect(),
        }
    }
}

/// Client for one user's view of the API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: HttpClient,
    user_id: String,
}

impl ApiClient {
    pub fn new(client: HttpClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fetch the user's task definitions.
    pub async fn get_apps(&self) -> ApiResult<Vec<TaskConfig>> {
        let path = format!("/apps/{}", self.user_id);
        let apps: Vec<ApiApp> = self.client.get_json(&path).await?;
        info!(user = %self.user_id, count = apps.len(), "fetched apps from API");
        Ok(apps.into_iter().map(TaskConfig::from).collect())
    }

    /// Current demand for one task.
    pub async fn get_demand(&self, task: &str) -> ApiResult<i32> {
        let path = format!("/demand/{}/{task}", self.user_id);
        let response: DemandResponse = self.client.get_json(&path).await?;
        debug!(%task, demand = response.demand, "demand from API");
        Ok(response.demand)
    }

    /// PUT the current requested/running counts.
    pub async fn send_state(&self, tasks: &TaskSet) -> ApiResult<()> {
        let payload = StatePayload::from_tasks(tasks, epoch_secs());
        let path = format!("/metrics/{}", self.user_id);
        let body = serde_json::to_vec(&payload)?;

        let response = self.client.send(Method::PUT, &path, Some(body)).await?;
        if response.status.as_u16() > 204 {
            return Err(ApiError::Status(response.status));
        }
        debug!(user = %self.user_id, tasks = payload.tasks.len(), "state sent to API");
        Ok(())
    }
}

/// Demand input backed by [`ApiClient::get_demand`].
#[derive(Debug, Clone)]
pub struct ApiDemand {
    client: ApiClient,
}

impl ApiDemand {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl DemandInput for ApiDemand {
    fn get_demand<'a>(&'a mut self, identifier: &'a str) -> DemandFuture<'a> {
        Box::pin(async move {
            self.client
                .get_demand(identifier)
                .await
                .map_err(|e| fleetscale_demand::DemandError::Input(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, put};
    use fleetscale_demand::{QueueLengthTarget, StaticMetric, Task};
    use serde_json::{Value, json};

    async fn serve(router: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ApiClient::new(HttpClient::new(&format!("http://{addr}")).unwrap(), "5k5gk")
    }

    #[tokio::test]
    async fn fetches_apps_as_task_configs() {
        let router = Router::new().route(
            "/apps/{user}",
            get(|Path(user): Path<String>| async move {
                assert_eq!(user, "5k5gk");
                Json(json!([
                    {
                        "name": "priority1",
                        "image": "example/consumer:latest",
                        "priority": 1,
                        "minContainers": 1,
                        "maxContainers": 9,
                        "target": { "type": "queue_length", "length": 5, "step": 2 }
                    },
                    {
                        "name": "priority2",
                        "image": "example/batch:latest",
                        "command": "/run.sh",
                        "priority": 2,
                        "maxContainers": 9,
                        "target": { "type": "remainder" }
                    }
                ]))
            }),
        );
        let api = serve(router).await;

        let apps = api.get_apps().await.unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "priority1");
        assert_eq!(apps[0].min_containers, 1);
        assert_eq!(apps[0].target, TargetConfig::QueueLength { length: 5, step: 2 });
        assert!(apps[0].scalable);
        assert_eq!(apps[1].command.as_deref(), Some("/run.sh"));
        assert_eq!(apps[1].target, TargetConfig::Remainder);
        assert_eq!(apps[1].min_containers, 0);
    }

    #[tokio::test]
    async fn demand_input_polls_per_task() {
        let router = Router::new().route(
            "/demand/{user}/{task}",
            get(|Path((_user, task)): Path<(String, String)>| async move {
                let demand = if task == "priority1" { 6 } else { 2 };
                Json(json!({ "demand": demand }))
            }),
        );
        let mut input = ApiDemand::new(serve(router).await);
        assert_eq!(input.get_demand("priority1").await.unwrap(), 6);
        assert_eq!(input.get_demand("priority2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn demand_error_maps_to_input_error() {
        let router = Router::new().route(
            "/demand/{user}/{task}",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let mut input = ApiDemand::new(serve(router).await);
        assert!(matches!(
            input.get_demand("priority1").await,
            Err(fleetscale_demand::DemandError::Input(_))
        ));
    }

    #[tokio::test]
    async fn sends_state_as_json_put() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let router = Router::new()
            .route(
                "/metrics/{user}",
                put(
                    |State(seen): State<Arc<Mutex<Option<Value>>>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        assert_eq!(headers["content-type"], "application/json");
                        *seen.lock().unwrap() = Some(body);
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(seen.clone());
        let api = serve(router).await;

        let mut p1 = Task::new(
            "priority1",
            Box::new(StaticMetric(0)),
            Box::new(QueueLengthTarget::new(0, 1)),
        )
        .with_priority(1)
        .with_bounds(0, 9)
        .with_running(3);
        p1.demand = 5;
        let set = TaskSet::from_tasks(9, [p1]).unwrap();

        api.send_state(&set).await.unwrap();

        let body = seen.lock().unwrap().clone().unwrap();
        assert!(body["createdAt"].as_u64().unwrap() > 0);
        assert_eq!(
            body["tasks"][0],
            json!({ "app": "priority1", "priority": 1, "requested": 3, "running": 3, "demand": 5 })
        );
    }

    #[tokio::test]
    async fn state_report_rejects_status_above_204() {
        let router = Router::new().route("/metrics/{user}", put(|| async { StatusCode::ACCEPTED }));
        let api = serve(router).await;
        let set = TaskSet::new(9);
        api.send_state(&set).await.unwrap();

        let router = Router::new().route(
            "/metrics/{user}",
            put(|| async { StatusCode::PARTIAL_CONTENT }),
        );
        let api = serve(router).await;
        assert!(matches!(
            api.send_state(&set).await,
            Err(ApiError::Status(status)) if status.as_u16() == 206
        ));
    }
}
