//! Metric sources — the reading each task's target policy consumes.
//!
//! The engine only ever calls [`Metric::current`]. The control loop calls
//! [`Metric::update_current`] once per cycle beforehand; a failed refresh
//! keeps the previous reading.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, warn};

use fleetscale_core::{HttpClient, with_query};

use crate::error::DemandResult;
use crate::input::DemandInput;

/// Boxed future returned by [`Metric::update_current`].
pub type MetricFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A numeric demand reading owned by a task.
pub trait Metric: Send + Sync + fmt::Debug {
    /// Latest known reading. Never blocks.
    fn current(&self) -> i32;

    /// Refresh the reading from its source.
    fn update_current(&mut self) -> MetricFuture<'_> {
        Box::pin(async {})
    }
}

/// A fixed reading. Used for non-scalable tasks and in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticMetric(pub i32);

impl Metric for StaticMetric {
    fn current(&self) -> i32 {
        self.0
    }
}

/// Reading taken from a [`DemandInput`] under the task's name.
#[derive(Debug)]
pub struct InputMetric {
    task: String,
    input: Box<dyn DemandInput>,
    current: i32,
}

impl InputMetric {
    pub fn new(task: impl Into<String>, input: Box<dyn DemandInput>) -> Self {
        Self {
            task: task.into(),
            input,
            current: 0,
        }
    }
}

impl Metric for InputMetric {
    fn current(&self) -> i32 {
        self.current
    }

    fn update_current(&mut self) -> MetricFuture<'_> {
        Box::pin(async move {
            match self.input.get_demand(&self.task).await {
                Ok(value) => self.current = value,
                Err(e) => warn!(
                    task = %self.task,
                    error = %e,
                    kept = self.current,
                    "failed to get new demand"
                ),
            }
        })
    }
}

/// Depth of an nsqd topic/channel, read from the `/stats` endpoint.
#[derive(Debug)]
pub struct NsqMetric {
    client: HttpClient,
    topic: String,
    channel: String,
    current: i32,
}

#[derive(Debug, Deserialize)]
struct NsqStats {
    #[serde(default)]
    topics: Vec<NsqTopic>,
}

#[derive(Debug, Deserialize)]
struct NsqTopic {
    topic_name: String,
    #[serde(default)]
    depth: i64,
    #[serde(default)]
    channels: Vec<NsqChannel>,
}

#[derive(Debug, Deserialize)]
struct NsqChannel {
    channel_name: String,
    #[serde(default)]
    depth: i64,
}

impl NsqMetric {
    /// `client` must point at the nsqd HTTP address.
    pub fn new(client: HttpClient, topic: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            channel: channel.into(),
            current: 0,
        }
    }

    async fn fetch(&self) -> DemandResult<i32> {
        let path = with_query(
            "/stats",
            &[("format", "json"), ("topic", self.topic.as_str()), ("channel", self.channel.as_str())],
        );
        let value: serde_json::Value = self.client.get_json(&path).await?;
        // nsqd before 1.0 wraps the payload in {"status_code", "data"}.
        let stats: NsqStats = match value.get("data") {
            Some(data) => serde_json::from_value(data.clone()),
            None => serde_json::from_value(value),
        }
        .map_err(fleetscale_core::HttpError::from)?;

        Ok(channel_depth(&stats, &self.topic, &self.channel))
    }
}

fn channel_depth(stats: &NsqStats, topic: &str, channel: &str) -> i32 {
    let Some(t) = stats.topics.iter().find(|t| t.topic_name == topic) else {
        return 0;
    };
    let depth = t
        .channels
        .iter()
        .find(|c| c.channel_name == channel)
        .map(|c| c.depth)
        .unwrap_or(t.depth);
    depth.clamp(0, i32::MAX as i64) as i32
}

impl Metric for NsqMetric {
    fn current(&self) -> i32 {
        self.current
    }

    fn update_current(&mut self) -> MetricFuture<'_> {
        Box::pin(async move {
            match self.fetch().await {
                Ok(depth) => {
                    debug!(topic = %self.topic, channel = %self.channel, depth, "nsq depth");
                    self.current = depth;
                }
                Err(e) => warn!(
                    topic = %self.topic,
                    channel = %self.channel,
                    error = %e,
                    "failed to read nsq stats"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DemandError;
    use crate::input::DemandFuture;

    use axum::Router;
    use axum::extract::Query;
    use axum::routing::get;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct ScriptedInput {
        values: Vec<DemandResult<i32>>,
    }

    impl DemandInput for ScriptedInput {
        fn get_demand<'a>(&'a mut self, _identifier: &'a str) -> DemandFuture<'a> {
            let next = if self.values.is_empty() {
                Err(DemandError::Input("exhausted".to_string()))
            } else {
                self.values.remove(0)
            };
            Box::pin(async move { next })
        }
    }

    #[tokio::test]
    async fn static_metric_ignores_updates() {
        let mut m = StaticMetric(5);
        m.update_current().await;
        assert_eq!(m.current(), 5);
    }

    #[tokio::test]
    async fn input_metric_keeps_last_value_on_error() {
        let input = ScriptedInput {
            values: vec![Ok(4), Err(DemandError::Input("api down".to_string())), Ok(7)],
        };
        let mut m = InputMetric::new("p1", Box::new(input));
        assert_eq!(m.current(), 0);

        m.update_current().await;
        assert_eq!(m.current(), 4);

        m.update_current().await;
        assert_eq!(m.current(), 4);

        m.update_current().await;
        assert_eq!(m.current(), 7);
    }

    #[test]
    fn channel_depth_prefers_channel_then_topic() {
        let stats: NsqStats = serde_json::from_value(serde_json::json!({
            "topics": [
                { "topic_name": "other", "depth": 100, "channels": [] },
                { "topic_name": "jobs", "depth": 3, "channels": [
                    { "channel_name": "work", "depth": 12 }
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(channel_depth(&stats, "jobs", "work"), 12);
        assert_eq!(channel_depth(&stats, "jobs", "missing"), 3);
        assert_eq!(channel_depth(&stats, "absent", "work"), 0);
    }

    #[tokio::test]
    async fn nsq_metric_reads_depth_from_stats() {
        let router = Router::new().route(
            "/stats",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("format").map(String::as_str), Some("json"));
                let topic = q.get("topic").cloned().unwrap_or_default();
                axum::Json(serde_json::json!({
                    "status_code": 200,
                    "data": { "topics": [{
                        "topic_name": topic,
                        "depth": 0,
                        "channels": [{ "channel_name": "work", "depth": 17 }]
                    }]}
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = HttpClient::new(&format!("http://{addr}")).unwrap();
        let mut m = NsqMetric::new(client, "jobs", "work");
        m.update_current().await;
        assert_eq!(m.current(), 17);
    }

    #[tokio::test]
    async fn nsq_metric_keeps_value_when_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(&format!("http://{addr}")).unwrap();
        let mut m = NsqMetric::new(client, "jobs", "work");
        m.current = 6;
        m.update_current().await;
        assert_eq!(m.current(), 6);
    }
}
