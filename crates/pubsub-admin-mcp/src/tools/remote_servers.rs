//! Remote server tools.
//!
//! `create_remote_server` takes a flat argument object and assembles the
//! type-specific endpoint from it. Missing type-specific fields are caught
//! before anything is sent to the server.

use super::{add, name_arguments, status, validate_name, AdminOperation, NameInput, NoArguments};
use crate::args;
use crate::error::{InvocationError, RegistryError};
use crate::format::{envelope_result, KeyArguments};
use crate::mcp::{ToolRegistry, ToolResult};
use crate::sdk::{
    CheckRemoteServerResult, RemoteError, RemoteResult, RemoteServer, RemoteServerDefinition,
    RemoteServerEndpoint, RemoteServerType, Session,
};
use crate::session::SessionLookup;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) async fn register(
    registry: &ToolRegistry,
    sessions: &Arc<dyn SessionLookup>,
) -> Result<(), RegistryError> {
    add(registry, sessions, CreateRemoteServer).await?;
    add(registry, sessions, ListRemoteServers).await?;
    add(registry, sessions, CheckRemoteServer).await?;
    add(registry, sessions, RemoveRemoteServer).await?;
    Ok(())
}

#[derive(Clone, Deserialize, JsonSchema)]
#[cfg_attr(test, derive(Debug))]
#[serde(rename_all = "camelCase")]
pub struct CreateRemoteServerInput {
    /// Remote server name
    #[schemars(length(min = 1))]
    pub name: String,
    /// Direction of the link
    #[serde(rename = "type")]
    pub server_type: RemoteServerType,
    /// Primary server URL (SECONDARY_INITIATOR)
    #[serde(default)]
    pub url: Option<String>,
    /// Secondary server URLs (PRIMARY_INITIATOR)
    #[serde(default)]
    #[schemars(extend("uniqueItems" = true))]
    pub urls: Vec<String>,
    /// Connector used for outbound connections (PRIMARY_INITIATOR)
    #[serde(default)]
    pub connector: Option<String>,
    /// Host name of the expected primary server (SECONDARY_ACCEPTOR)
    #[serde(default)]
    pub primary_host_name: Option<String>,
    /// Principal to authenticate as on the remote server
    #[serde(default)]
    pub principal: Option<String>,
    /// Password for `principal`
    #[serde(default)]
    pub password: Option<String>,
    /// Connection options, e.g. `RECONNECTION_TIMEOUT`
    #[serde(default)]
    pub connection_options: BTreeMap<String, String>,
    /// Topic selector for forwarding missing topic notifications
    #[serde(default)]
    pub missing_topic_notification_filter: Option<String>,
    /// Delay between connection retries in milliseconds
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    /// Check the connection state right after creating the server
    #[serde(default)]
    pub check: bool,
}

impl CreateRemoteServerInput {
    fn endpoint(&self) -> Result<RemoteServerEndpoint, String> {
        let endpoint = match self.server_type {
            RemoteServerType::SecondaryInitiator => RemoteServerEndpoint::SecondaryInitiator {
                url: required(&self.url, "url", self.server_type)?,
            },
            RemoteServerType::PrimaryInitiator => {
                if self.urls.is_empty() {
                    return Err(format!("`urls` is required for {}", self.server_type));
                }
                RemoteServerEndpoint::PrimaryInitiator {
                    urls: self.urls.clone(),
                    connector: required(&self.connector, "connector", self.server_type)?,
                }
            }
            RemoteServerType::SecondaryAcceptor => RemoteServerEndpoint::SecondaryAcceptor {
                primary_host_name: required(
                    &self.primary_host_name,
                    "primaryHostName",
                    self.server_type,
                )?,
            },
        };
        Ok(endpoint)
    }

    fn definition(&self) -> Result<RemoteServerDefinition, String> {
        Ok(RemoteServerDefinition {
            name: self.name.clone(),
            endpoint: self.endpoint()?,
            principal: self.principal.clone(),
            password: self.password.clone(),
            connection_options: self.connection_options.clone(),
            missing_topic_notification_filter: self.missing_topic_notification_filter.clone(),
            retry_delay_ms: self.retry_delay_ms,
        })
    }
}

fn required(value: &Option<String>, field: &str, server_type: RemoteServerType) -> Result<String, String> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(format!("`{}` is required for {}", field, server_type)),
    }
}

/// A created server, and its state when a check was requested.
#[derive(Debug)]
pub struct Created {
    pub server: RemoteServer,
    pub check: Option<CheckRemoteServerResult>,
}

fn insert_check(extra: &mut Map<String, Value>, check: &CheckRemoteServerResult) {
    extra.insert("state".to_string(), json!(check.state));
    if let Some(message) = &check.failure_message {
        extra.insert("failureMessage".to_string(), json!(message));
    }
}

pub struct CreateRemoteServer;

#[async_trait]
impl AdminOperation for CreateRemoteServer {
    type Input = CreateRemoteServerInput;
    type Output = Created;

    const NAME: &'static str = "create_remote_server";
    const KEY_FIELDS: &'static [&'static str] = &["name", "type"];
    const DESCRIPTION: &'static str = "Create a remote server link. SECONDARY_INITIATOR needs `url`, \
        PRIMARY_INITIATOR needs `urls` and `connector`, SECONDARY_ACCEPTOR needs `primaryHostName`. \
        Set `check` to report the connection state straight away.";

    fn validate(&self, input: &CreateRemoteServerInput) -> Result<(), InvocationError> {
        args::require_non_blank("name", &input.name)?;
        args::require_names("urls", &input.urls)?;
        input.endpoint().map(|_| ()).map_err(InvocationError::Validation)
    }

    fn key_arguments(&self, input: &CreateRemoteServerInput) -> KeyArguments {
        KeyArguments::new()
            .with("name", &input.name)
            .with("type", input.server_type)
    }

    // Create and check share one bounded wait.
    async fn dispatch(&self, session: &dyn Session, input: &CreateRemoteServerInput) -> RemoteResult<Created> {
        let definition = input.definition().map_err(RemoteError::rejected)?;
        let feature = session.remote_servers();
        let server = feature.create_remote_server(&definition).await?;
        let check = if input.check {
            Some(feature.check_remote_server(&definition.name).await?)
        } else {
            None
        };
        Ok(Created { server, check })
    }

    fn format(&self, arguments: &KeyArguments, created: Created) -> ToolResult {
        let mut extra = Map::new();
        if let Some(check) = &created.check {
            insert_check(&mut extra, check);
        }
        envelope_result(arguments, "created", extra)
    }
}

pub struct ListRemoteServers;

#[async_trait]
impl AdminOperation for ListRemoteServers {
    type Input = NoArguments;
    type Output = Vec<RemoteServer>;

    const NAME: &'static str = "list_remote_servers";
    const DESCRIPTION: &'static str = "List all remote servers. Credentials are not included.";

    async fn dispatch(&self, session: &dyn Session, _input: &NoArguments) -> RemoteResult<Vec<RemoteServer>> {
        session.remote_servers().list_remote_servers().await
    }

    fn format(&self, arguments: &KeyArguments, servers: Vec<RemoteServer>) -> ToolResult {
        let mut extra = Map::new();
        extra.insert("count".to_string(), json!(servers.len()));
        extra.insert(
            "servers".to_string(),
            serde_json::to_value(&servers).unwrap_or(Value::Array(Vec::new())),
        );
        envelope_result(arguments, "listed", extra)
    }
}

pub struct CheckRemoteServer;

#[async_trait]
impl AdminOperation for CheckRemoteServer {
    type Input = NameInput;
    type Output = CheckRemoteServerResult;

    const NAME: &'static str = "check_remote_server";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str =
        "Report the connection state of a remote server. An unknown name reports MISSING.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<CheckRemoteServerResult> {
        session.remote_servers().check_remote_server(&input.name).await
    }

    fn format(&self, arguments: &KeyArguments, check: CheckRemoteServerResult) -> ToolResult {
        let mut extra = Map::new();
        insert_check(&mut extra, &check);
        envelope_result(arguments, "checked", extra)
    }
}

pub struct RemoveRemoteServer;

#[async_trait]
impl AdminOperation for RemoveRemoteServer {
    type Input = NameInput;
    type Output = ();

    const NAME: &'static str = "remove_remote_server";
    const KEY_FIELDS: &'static [&'static str] = &["name"];
    const DESCRIPTION: &'static str = "Remove a remote server. Removing an unknown server succeeds.";

    fn validate(&self, input: &NameInput) -> Result<(), InvocationError> {
        validate_name(input)
    }

    fn key_arguments(&self, input: &NameInput) -> KeyArguments {
        name_arguments(input)
    }

    async fn dispatch(&self, session: &dyn Session, input: &NameInput) -> RemoteResult<()> {
        session.remote_servers().remove_remote_server(&input.name).await
    }

    fn format(&self, arguments: &KeyArguments, _output: ()) -> ToolResult {
        status(arguments, "removed")
    }
}
