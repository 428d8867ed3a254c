//! Admin tools.
//!
//! Each tool is an [`AdminOperation`]: a typed input, the key arguments it
//! reports, the remote operation it dispatches and a success formatter.
//! [`OperationTool`] wraps an operation into an MCP [`Tool`] and runs the
//! shared pipeline:
//!
//! 1. parse and validate the arguments (no session needed)
//! 2. look up the caller's session
//! 3. dispatch under the operation timeout and format the outcome
//!
//! Tool categories:
//! - Security store (11 tools)
//! - System authentication store (12 tools)
//! - Metrics (10 tools)
//! - Topic views (4 tools)
//! - Remote servers (4 tools)

pub mod authentication;
pub mod metrics;
pub mod remote_servers;
pub mod security;
pub mod topic_views;

use crate::args;
use crate::error::{InvocationError, RegistryError};
use crate::format::KeyArguments;
use crate::invoke::{invoke, CallSite};
use crate::mcp::{Tool, ToolContext, ToolRegistry, ToolResult};
use crate::sdk::{RemoteResult, Session};
use crate::session::SessionLookup;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// One administrative operation exposed as a tool.
#[async_trait]
pub trait AdminOperation: Send + Sync + 'static {
    type Input: DeserializeOwned + JsonSchema + Send + Sync;
    type Output: Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    /// Wire names of the fields [`AdminOperation::key_arguments`] reports.
    /// Used when the input fails to parse. Secrets never belong here.
    const KEY_FIELDS: &'static [&'static str] = &[];

    /// Checks beyond what deserialization enforces.
    fn validate(&self, _input: &Self::Input) -> Result<(), InvocationError> {
        Ok(())
    }

    /// Identifying arguments echoed in results and error text.
    fn key_arguments(&self, _input: &Self::Input) -> KeyArguments {
        KeyArguments::new()
    }

    async fn dispatch(&self, session: &dyn Session, input: &Self::Input) -> RemoteResult<Self::Output>;

    fn format(&self, arguments: &KeyArguments, output: Self::Output) -> ToolResult;
}

/// Adapts an [`AdminOperation`] to the [`Tool`] interface.
pub struct OperationTool<Op> {
    operation: Op,
    sessions: Arc<dyn SessionLookup>,
    schema: Value,
}

impl<Op: AdminOperation> OperationTool<Op> {
    pub fn new(operation: Op, sessions: Arc<dyn SessionLookup>) -> Self {
        Self {
            operation,
            sessions,
            schema: input_schema::<Op::Input>(),
        }
    }
}

#[async_trait]
impl<Op: AdminOperation> Tool for OperationTool<Op> {
    fn name(&self) -> &str {
        Op::NAME
    }

    fn description(&self) -> Option<&str> {
        Some(Op::DESCRIPTION)
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> ToolResult {
        let supplied = KeyArguments::from_raw(&input, Op::KEY_FIELDS);
        let input: Op::Input = match args::parse(input) {
            Ok(input) => input,
            Err(error) => return CallSite::new(Op::NAME, &supplied).fail(&error),
        };

        let arguments = self.operation.key_arguments(&input);
        let call = CallSite::new(Op::NAME, &arguments);
        if let Err(error) = self.operation.validate(&input) {
            return call.fail(&error);
        }

        let session_id = context.session_id().unwrap_or(crate::DEFAULT_SESSION_ID);
        let Some(session) = self.sessions.lookup(session_id) else {
            return call.fail(&InvocationError::NoSession(session_id.to_string()));
        };

        debug!(
            tool = Op::NAME,
            session_id,
            client = context.client_name().unwrap_or("unknown"),
            arguments = %arguments,
            "Dispatching admin operation"
        );
        invoke(
            call,
            self.operation.dispatch(session.as_ref(), &input),
            |output| self.operation.format(&arguments, output),
        )
        .await
    }
}

/// JSON schema for a tool input type, without the draft header.
pub fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = schemars::schema_for!(T).to_value();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

/// Input of tools that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArguments {}

/// Input of tools addressing one named entity.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NameInput {
    /// Name of the entity
    #[schemars(length(min = 1))]
    pub name: String,
}

pub(crate) fn validate_name(input: &NameInput) -> Result<(), InvocationError> {
    args::require_non_blank("name", &input.name)
}

pub(crate) fn name_arguments(input: &NameInput) -> KeyArguments {
    KeyArguments::new().with("name", &input.name)
}

/// Success result carrying only the key arguments and `status`.
pub(crate) fn status(arguments: &KeyArguments, status: &str) -> ToolResult {
    crate::format::envelope_result(arguments, status, Default::default())
}

/// Registers every admin tool.
pub async fn register_all(
    registry: &ToolRegistry,
    sessions: Arc<dyn SessionLookup>,
) -> Result<(), RegistryError> {
    security::register(registry, &sessions).await?;
    authentication::register(registry, &sessions).await?;
    metrics::register(registry, &sessions).await?;
    topic_views::register(registry, &sessions).await?;
    remote_servers::register(registry, &sessions).await?;
    Ok(())
}

/// Registers `operation` as a tool.
pub(crate) async fn add<Op: AdminOperation>(
    registry: &ToolRegistry,
    sessions: &Arc<dyn SessionLookup>,
    operation: Op,
) -> Result<(), RegistryError> {
    registry
        .register(OperationTool::new(operation, Arc::clone(sessions)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;

    #[tokio::test]
    async fn test_catalogue_is_complete() {
        let registry = ToolRegistry::new();
        register_all(&registry, Arc::new(SessionRegistry::new()))
            .await
            .unwrap();

        let names = registry.names().await;
        assert_eq!(names.len(), 41);
        for name in &names {
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'), "{name}");
        }
    }

    #[tokio::test]
    async fn test_schemas_are_objects() {
        let registry = ToolRegistry::new();
        register_all(&registry, Arc::new(SessionRegistry::new()))
            .await
            .unwrap();

        for definition in registry.list().await {
            assert_eq!(definition.input_schema["type"], "object", "{}", definition.name);
            assert!(definition.input_schema.get("$schema").is_none());
            assert!(definition.description.is_some());
        }
    }

    #[test]
    fn test_name_input_schema_requires_name() {
        let schema = input_schema::<NameInput>();
        assert_eq!(schema["required"][0], "name");
        assert_eq!(schema["properties"]["name"]["minLength"], 1);
    }
}
