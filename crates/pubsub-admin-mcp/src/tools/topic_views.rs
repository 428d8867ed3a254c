//! Topic view tools.

use super::{add, name_arguments, status, validate_name, AdminOperation, NameInput, NoArguments};
use crate::args;
use crate::error::{InvocationError, RegistryError};
use crate::format::{envelope_result, KeyArguments};
use crate::mcp::{ToolRegistry, ToolResult};
use crate::sdk::{RemoteResult, Session, TopicView};
use crate::session::SessionLookup;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub(crate) async fn register(
    registry: &ToolRegistry,
    sessions: &Arc<dyn SessionLookup>,
) -> Result<(), RegistryError> {
    add(registry, sessions, CreateTopicView).await?;
    add(registry, sessions, ListTopicViews).await?;
    add(registry, sessions, GetTopicView).await?;
    add(registry, sessions, RemoveTopicView).await?;
    Ok(())
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TopicViewInput {
    /// View name; an existing view with this name is replaced
    #[schemars(length(min = 1))]
    pub name: String,
    /// View specification, e.g. `map ?prices// to views/<path(1)>`
    #[schemars(length(min = 1))]
    pub specification: String,
}

pub struct CreateTopicView;

#[async_trait]
impl AdminOperation for CreateTopicView {
    type Input = TopicViewInput;
    type Output = TopicView;

    const NAME: &'static str = "create_topic_view";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str =
        "Create or replace a topic view. The view evaluates with the roles of the calling session.";

    fn validate(&self, input: &TopicViewInput) -> Result<(), InvocationError> {
        args::require_non_blank("name", &input.name)?;
        args::require_non_blank("specification", &input.specification)
    }

    fn key_arguments(&self, input: &TopicViewInput) -> KeyArguments {
        KeyArguments::new().with("name", &input.name)
    }

    async fn dispatch(&self, session: &dyn Session, input: &TopicViewInput) -> RemoteResult<TopicView> {
        session
            .topic_views()
            .create_topic_view(&input.name, &input.specification)
            .await
    }

    fn format(&self, arguments: &KeyArguments, view: TopicView) -> ToolResult {
        let mut extra = Map::new();
        extra.insert("specification".to_string(), json!(view.specification));
        extra.insert("roles".to_string(), json!(view.roles));
        envelope_result(arguments, "created", extra)
    }
}

pub struct ListTopicViews;

#[async_trait]
impl AdminOperation for ListTopicViews {
    type Input = NoArguments;
    type Output = Vec<TopicView>;

    const NAME: &'static str = "list_topic_views";
    const DESCRIPTION: &'static str = "List all topic views.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<Vec<TopicView>> {
        session.topic_views().list_topic_views().await
    }

    fn format(&self, arguments: &KeyArguments, views: Vec<TopicView>) -> ToolResult {
        let mut extra = Map::new();
        extra.insert("count".to_string(), json!(views.len()));
        extra.insert(
            "views".to_string(),
            serde_json::to_value(&views).unwrap_or(Value::Array(Vec::new())),
        );
        envelope_result(arguments, "listed", extra)
    }
}

pub struct GetTopicView;

#[async_trait]
impl AdminOperation for GetTopicView {
    type Input = NameInput;
    type Output = Option<TopicView>;

    const NAME: &'static str = "get_topic_view";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str = "Look up one topic view by name.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<Option<TopicView>> {
        session.topic_views().get_topic_view(&input.name).await
    }

    // An absent view is a successful lookup, not an error.
    fn format(&self, arguments: &KeyArguments, view: Option<TopicView>) -> ToolResult {
        match view {
            Some(view) => {
                let mut extra = Map::new();
                extra.insert("specification".to_string(), json!(view.specification));
                extra.insert("roles".to_string(), json!(view.roles));
                envelope_result(arguments, "found", extra)
            }
            None => status(arguments, "not_found"),
        }
    }
}

pub struct RemoveTopicView;

#[async_trait]
impl AdminOperation for RemoveTopicView {
    type Input = NameInput;
    type Output = ();

    const NAME: &'static str = "remove_topic_view";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str =
        "Remove a topic view and the reference topics it created. Removing an unknown view succeeds.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<()> {
        session.topic_views().remove_topic_view(&input.name).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}
