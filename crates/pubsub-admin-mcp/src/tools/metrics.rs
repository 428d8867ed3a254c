//! Metric collector, metric alert and metric sampling tools.

use super::{add, name_arguments, status, validate_name, AdminOperation, NameInput, NoArguments};
use crate::args;
use crate::error::{InvocationError, RegistryError};
use crate::format::{envelope_result, KeyArguments};
use crate::mcp::{ToolRegistry, ToolResult};
use crate::sdk::{
    MetricAlert, MetricSample, RemoteResult, Session, SessionMetricCollector, TopicMetricCollector,
};
use crate::session::SessionLookup;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Group limit applied when a collector does not set one.
pub const UNLIMITED_GROUPS: u32 = i32::MAX as u32;

pub(crate) async fn register(
    registry: &ToolRegistry,
    sessions: &Arc<dyn SessionLookup>,
) -> Result<(), RegistryError> {
    add(registry, sessions, PutSessionMetricCollector).await?;
    add(registry, sessions, ListSessionMetricCollectors).await?;
    add(registry, sessions, RemoveSessionMetricCollector).await?;
    add(registry, sessions, PutTopicMetricCollector).await?;
    add(registry, sessions, ListTopicMetricCollectors).await?;
    add(registry, sessions, RemoveTopicMetricCollector).await?;
    add(registry, sessions, SetMetricAlert).await?;
    add(registry, sessions, ListMetricAlerts).await?;
    add(registry, sessions, RemoveMetricAlert).await?;
    add(registry, sessions, FetchMetrics).await?;
    Ok(())
}

/// `listed` envelope with the items under `field` and their count.
fn listing<T: Serialize>(arguments: &KeyArguments, field: &str, items: &[T]) -> ToolResult {
    let mut extra = Map::new();
    extra.insert(field.to_string(), serde_json::to_value(items).unwrap_or_else(|_| json!([])));
    extra.insert("count".to_string(), json!(items.len()));
    envelope_result(arguments, "listed", extra)
}

fn validate_maximum_groups(maximum_groups: Option<u32>) -> Result<(), InvocationError> {
    if maximum_groups == Some(0) {
        return Err(InvocationError::validation("`maximumGroups` must be at least 1"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionCollectorInput {
    /// Collector name; an existing collector with this name is replaced
    #[schemars(length(min = 1))]
    pub name: String,
    /// Session filter selecting the sessions to collect metrics for
    #[schemars(length(min = 1))]
    pub session_filter: String,
    /// Export the collected metrics to Prometheus
    #[serde(default)]
    pub export_to_prometheus: bool,
    /// Maximum number of groups; unlimited when omitted
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub maximum_groups: Option<u32>,
    /// Drop groups once no session matches them
    #[serde(default)]
    pub removes_metrics_with_no_matches: bool,
    /// Session properties to group by
    #[serde(default)]
    #[schemars(extend("uniqueItems" = true))]
    pub group_by_properties: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicCollectorInput {
    /// Collector name; an existing collector with this name is replaced
    #[schemars(length(min = 1))]
    pub name: String,
    /// Topic selector choosing the topics to collect metrics for
    #[schemars(length(min = 1))]
    pub topic_selector: String,
    #[serde(default)]
    pub export_to_prometheus: bool,
    /// Maximum number of groups; unlimited when omitted
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub maximum_groups: Option<u32>,
    /// Group metrics by topic type
    #[serde(default)]
    pub group_by_topic_type: bool,
    /// Group metrics by the topic view that created the topic
    #[serde(default)]
    pub group_by_topic_view: bool,
    /// Group metrics by this many leading path segments
    #[serde(default)]
    pub group_by_path_prefix_parts: u8,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MetricAlertInput {
    /// Alert name; an existing alert with this name is replaced
    #[schemars(length(min = 1))]
    pub name: String,
    /// Alert query, starting with `select`
    #[schemars(length(min = 1))]
    pub specification: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct FetchMetricsInput {
    /// Metric name prefixes; all metrics when empty
    #[serde(default)]
    #[schemars(extend("uniqueItems" = true))]
    pub filter: Vec<String>,
}

pub struct PutSessionMetricCollector;

#[async_trait]
impl AdminOperation for PutSessionMetricCollector {
    type Input = SessionCollectorInput;
    type Output = ();

    const NAME: &'static str = "put_session_metric_collector";
    const KEY_FIELDS: &'static [&'static str] = &["name", "sessionFilter"];
    const DESCRIPTION: &'static str =
        "Create or replace a session metric collector that groups sessions matching a filter.";

    fn validate(&self, input: &SessionCollectorInput) -> Result<(), InvocationError> {
        args::require_non_blank("name", &input.name)?;
        args::require_non_blank("sessionFilter", &input.session_filter)?;
        validate_maximum_groups(input.maximum_groups)?;
        args::require_names("groupByProperties", &input.group_by_properties)
    }

    fn key_arguments(&self, input: &SessionCollectorInput) -> KeyArguments {
        KeyArguments::new()
            .with("name", &input.name)
            .with("sessionFilter", &input.session_filter)
    }

    async fn dispatch(&self, session: &dyn Session, input: &SessionCollectorInput) -> RemoteResult<()> {
        let collector = SessionMetricCollector {
            name: input.name.clone(),
            session_filter: input.session_filter.clone(),
            exports_to_prometheus: input.export_to_prometheus,
            maximum_groups: input.maximum_groups.unwrap_or(UNLIMITED_GROUPS),
            removes_metrics_with_no_matches: input.removes_metrics_with_no_matches,
            group_by_properties: input.group_by_properties.clone(),
        };
        session.metrics().put_session_metric_collector(&collector).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "created")
    }
}

pub struct ListSessionMetricCollectors;

#[async_trait]
impl AdminOperation for ListSessionMetricCollectors {
    type Input = NoArguments;
    type Output = Vec<SessionMetricCollector>;

    const NAME: &'static str = "list_session_metric_collectors";
    const DESCRIPTION: &'static str = "List all session metric collectors.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<Vec<SessionMetricCollector>> {
        session.metrics().list_session_metric_collectors().await
    }

    fn format(&self, arguments: &KeyArguments, collectors: Vec<SessionMetricCollector>) -> ToolResult {
        listing(arguments, "collectors", &collectors)
    }
}

pub struct RemoveSessionMetricCollector;

#[async_trait]
impl AdminOperation for RemoveSessionMetricCollector {
    type Input = NameInput;
    type Output = ();

    const NAME: &'static str = "remove_session_metric_collector";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str = "Remove a session metric collector. Removing an unknown collector succeeds.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<()> {
        session.metrics().remove_session_metric_collector(&input.name).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}

pub struct PutTopicMetricCollector;

#[async_trait]
impl AdminOperation for PutTopicMetricCollector {
    type Input = TopicCollectorInput;
    type Output = ();

    const NAME: &'static str = "put_topic_metric_collector";
    const KEY_FIELDS: &'static [&'static str] = &["name", "topicSelector"];
    const DESCRIPTION: &'static str =
        "Create or replace a topic metric collector that aggregates topics matching a selector.";

    fn validate(&self, input: &TopicCollectorInput) -> Result<(), InvocationError> {
        args::require_non_blank("name", &input.name)?;
        args::require_non_blank("topicSelector", &input.topic_selector)?;
        validate_maximum_groups(input.maximum_groups)
    }

    fn key_arguments(&self, input: &TopicCollectorInput) -> KeyArguments {
        KeyArguments::new()
            .with("name", &input.name)
            .with("topicSelector", &input.topic_selector)
    }

    async fn dispatch(&self, session: &dyn Session, input: &TopicCollectorInput) -> RemoteResult<()> {
        let collector = TopicMetricCollector {
            name: input.name.clone(),
            topic_selector: input.topic_selector.clone(),
            exports_to_prometheus: input.export_to_prometheus,
            maximum_groups: input.maximum_groups.unwrap_or(UNLIMITED_GROUPS),
            groups_by_topic_type: input.group_by_topic_type,
            groups_by_topic_view: input.group_by_topic_view,
            group_by_path_prefix_parts: input.group_by_path_prefix_parts,
        };
        session.metrics().put_topic_metric_collector(&collector).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "created")
    }
}

pub struct ListTopicMetricCollectors;

#[async_trait]
impl AdminOperation for ListTopicMetricCollectors {
    type Input = NoArguments;
    type Output = Vec<TopicMetricCollector>;

    const NAME: &'static str = "list_topic_metric_collectors";
    const DESCRIPTION: &'static str = "List all topic metric collectors.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<Vec<TopicMetricCollector>> {
        session.metrics().list_topic_metric_collectors().await
    }

    fn format(&self, arguments: &KeyArguments, collectors: Vec<TopicMetricCollector>) -> ToolResult {
        listing(arguments, "collectors", &collectors)
    }
}

pub struct RemoveTopicMetricCollector;

#[async_trait]
impl AdminOperation for RemoveTopicMetricCollector {
    type Input = NameInput;
    type Output = ();

    const NAME: &'static str = "remove_topic_metric_collector";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str = "Remove a topic metric collector. Removing an unknown collector succeeds.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<()> {
        session.metrics().remove_topic_metric_collector(&input.name).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}

pub struct SetMetricAlert;

#[async_trait]
impl AdminOperation for SetMetricAlert {
    type Input = MetricAlertInput;
    type Output = ();

    const NAME: &'static str = "set_metric_alert";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str = "Create or replace a metric alert.";

    fn validate(&self, input: &MetricAlertInput) -> Result<(), InvocationError> {
        args::require_non_blank("name", &input.name)?;
        args::require_non_blank("specification", &input.specification)
    }

    fn key_arguments(&self, input: &MetricAlertInput) -> KeyArguments {
        KeyArguments::new().with("name", &input.name)
    }

    async fn dispatch(&self, session: &dyn Session, input: &MetricAlertInput) -> RemoteResult<()> {
        session
            .metrics()
            .set_metric_alert(&input.name, &input.specification)
            .await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "created")
    }
}

pub struct ListMetricAlerts;

#[async_trait]
impl AdminOperation for ListMetricAlerts {
    type Input = NoArguments;
    type Output = Vec<MetricAlert>;

    const NAME: &'static str = "list_metric_alerts";
    const DESCRIPTION: &'static str = "List all metric alerts.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<Vec<MetricAlert>> {
        session.metrics().list_metric_alerts().await
    }

    fn format(&self, arguments: &KeyArguments, alerts: Vec<MetricAlert>) -> ToolResult {
        listing(arguments, "alerts", &alerts)
    }
}

pub struct RemoveMetricAlert;

#[async_trait]
impl AdminOperation for RemoveMetricAlert {
    type Input = NameInput;
    type Output = ();

    const NAME: &'static str = "remove_metric_alert";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str = "Remove a metric alert. Removing an unknown alert succeeds.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<()> {
        session.metrics().remove_metric_alert(&input.name).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}

pub struct FetchMetrics;

#[async_trait]
impl AdminOperation for FetchMetrics {
    type Input = FetchMetricsInput;
    type Output = Vec<MetricSample>;

    const NAME: &'static str = "fetch_metrics";
    const KEY_FIELDS: &'static [&'static str] = &["filter"];
    const DESCRIPTION: &'static str =
        "Sample the server's current metrics, optionally restricted to names starting with given prefixes.";

    fn validate(&self, input: &FetchMetricsInput) -> Result<(), InvocationError> {
        args::require_names("filter", &input.filter)
    }

    fn key_arguments(&self, input: &FetchMetricsInput) -> KeyArguments {
        KeyArguments::new().with("filter", &input.filter)
    }

    async fn dispatch(&self, session: &dyn Session, input: &FetchMetricsInput) -> RemoteResult<Vec<MetricSample>> {
        session.metrics().fetch_metrics(&input.filter).await
    }

    fn format(&self, arguments: &KeyArguments, samples: Vec<MetricSample>) -> ToolResult {
        let mut extra = Map::new();
        extra.insert("count".to_string(), json!(samples.len()));
        extra.insert(
            "metrics".to_string(),
            serde_json::to_value(&samples).unwrap_or(Value::Array(Vec::new())),
        );
        envelope_result(arguments, "fetched", extra)
    }
}
