//! Metric collectors, metric alerts and metric sampling.

use super::error::RemoteResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Groups session metrics by session properties for sessions matching a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetricCollector {
    pub name: String,
    pub session_filter: String,
    pub exports_to_prometheus: bool,
    pub maximum_groups: u32,
    pub removes_metrics_with_no_matches: bool,
    pub group_by_properties: Vec<String>,
}

/// Aggregates topic metrics for topics matching a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMetricCollector {
    pub name: String,
    pub topic_selector: String,
    pub exports_to_prometheus: bool,
    pub maximum_groups: u32,
    pub groups_by_topic_type: bool,
    pub groups_by_topic_view: bool,
    pub group_by_path_prefix_parts: u8,
}

/// A named alert evaluated by the server against its metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlert {
    pub name: String,
    pub specification: String,
    pub principal: String,
}

/// A single sampled metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub name: String,
    pub server: String,
    pub value: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub labels: BTreeMap<String, String>,
}

#[async_trait]
pub trait MetricsFeature: Send + Sync {
    /// Adds a session metric collector, replacing any with the same name.
    async fn put_session_metric_collector(&self, collector: &SessionMetricCollector) -> RemoteResult<()>;

    async fn list_session_metric_collectors(&self) -> RemoteResult<Vec<SessionMetricCollector>>;

    async fn remove_session_metric_collector(&self, name: &str) -> RemoteResult<()>;

    /// Adds a topic metric collector, replacing any with the same name.
    async fn put_topic_metric_collector(&self, collector: &TopicMetricCollector) -> RemoteResult<()>;

    async fn list_topic_metric_collectors(&self) -> RemoteResult<Vec<TopicMetricCollector>>;

    async fn remove_topic_metric_collector(&self, name: &str) -> RemoteResult<()>;

    async fn set_metric_alert(&self, name: &str, specification: &str) -> RemoteResult<()>;

    async fn list_metric_alerts(&self) -> RemoteResult<Vec<MetricAlert>>;

    async fn remove_metric_alert(&self, name: &str) -> RemoteResult<()>;

    /// Samples current metrics. An empty filter selects everything; otherwise
    /// a metric is returned when its name starts with any filter entry.
    async fn fetch_metrics(&self, filter: &[String]) -> RemoteResult<Vec<MetricSample>>;
}
