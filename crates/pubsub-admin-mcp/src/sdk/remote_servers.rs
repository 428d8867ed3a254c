//! Remote servers: links that replicate topics between servers.

use super::error::RemoteResult;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The direction in which a remote server link is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteServerType {
    /// This server connects out to a primary server.
    SecondaryInitiator,
    /// This server connects out to secondary acceptors through a connector.
    PrimaryInitiator,
    /// This server accepts a connection from a primary initiator.
    SecondaryAcceptor,
}

impl RemoteServerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecondaryInitiator => "SECONDARY_INITIATOR",
            Self::PrimaryInitiator => "PRIMARY_INITIATOR",
            Self::SecondaryAcceptor => "SECONDARY_ACCEPTOR",
        }
    }
}

impl fmt::Display for RemoteServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RemoteServerEndpoint {
    #[serde(rename = "SECONDARY_INITIATOR")]
    SecondaryInitiator { url: String },
    #[serde(rename = "PRIMARY_INITIATOR", rename_all = "camelCase")]
    PrimaryInitiator { urls: Vec<String>, connector: String },
    #[serde(rename = "SECONDARY_ACCEPTOR", rename_all = "camelCase")]
    SecondaryAcceptor { primary_host_name: String },
}

impl RemoteServerEndpoint {
    pub fn server_type(&self) -> RemoteServerType {
        match self {
            Self::SecondaryInitiator { .. } => RemoteServerType::SecondaryInitiator,
            Self::PrimaryInitiator { .. } => RemoteServerType::PrimaryInitiator,
            Self::SecondaryAcceptor { .. } => RemoteServerType::SecondaryAcceptor,
        }
    }
}

/// Everything needed to create a remote server link.
///
/// `Debug` omits the password.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteServerDefinition {
    pub name: String,
    pub endpoint: RemoteServerEndpoint,
    pub principal: Option<String>,
    pub password: Option<String>,
    pub connection_options: BTreeMap<String, String>,
    pub missing_topic_notification_filter: Option<String>,
    pub retry_delay_ms: Option<u64>,
}

impl fmt::Debug for RemoteServerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteServerDefinition")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("principal", &self.principal)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connection_options", &self.connection_options)
            .field(
                "missing_topic_notification_filter",
                &self.missing_topic_notification_filter,
            )
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

/// A remote server as reported by the server. Credentials are never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServer {
    pub name: String,
    #[serde(flatten)]
    pub endpoint: RemoteServerEndpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub connection_options: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_topic_notification_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteServerState {
    Inactive,
    Connected,
    Retrying,
    Failed,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRemoteServerResult {
    pub state: RemoteServerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

#[async_trait]
pub trait RemoteServersFeature: Send + Sync {
    async fn create_remote_server(&self, definition: &RemoteServerDefinition) -> RemoteResult<RemoteServer>;

    async fn list_remote_servers(&self) -> RemoteResult<Vec<RemoteServer>>;

    /// Reports the connection state; an unknown name reports `MISSING`.
    async fn check_remote_server(&self, name: &str) -> RemoteResult<CheckRemoteServerResult>;

    async fn remove_remote_server(&self, name: &str) -> RemoteResult<()>;
}
