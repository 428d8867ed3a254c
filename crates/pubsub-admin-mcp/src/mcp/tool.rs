//! The `Tool` trait and the per-call context handed to tools.

use super::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// A tool that can be called by MCP clients.
///
/// Execution cannot fail at the type level: any failure is reported as a
/// result with `isError` set, so one bad call never affects the server.
///
/// # Examples
///
/// ```
/// use pubsub_admin_mcp::mcp::{Tool, ToolContext, ToolResult};
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn input_schema(&self) -> Value {
///         json!({"type": "object", "properties": {"message": {"type": "string"}}})
///     }
///
///     async fn execute(&self, input: Value, _context: &ToolContext) -> ToolResult {
///         match input["message"].as_str() {
///             Some(message) => ToolResult::success_text(message),
///             None => ToolResult::error("message is required"),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique, stable snake_case name.
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// JSON schema of the argument object.
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value, context: &ToolContext) -> ToolResult;
}

/// Information about the call being executed.
///
/// ```
/// use pubsub_admin_mcp::mcp::ToolContext;
///
/// let context = ToolContext::builder()
///     .session_id("session-123")
///     .client_info("my-client", "1.0.0")
///     .build();
///
/// assert_eq!(context.session_id(), Some("session-123"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    session_id: Option<String>,
    client_name: Option<String>,
    client_version: Option<String>,
    request_id: Option<Value>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ToolContextBuilder {
        ToolContextBuilder::default()
    }

    /// Id under which the target session is registered.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn client_version(&self) -> Option<&str> {
        self.client_version.as_deref()
    }

    pub fn request_id(&self) -> Option<&Value> {
        self.request_id.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct ToolContextBuilder {
    context: ToolContext,
}

impl ToolContextBuilder {
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.context.session_id = Some(id.into());
        self
    }

    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.context.client_name = Some(name.into());
        self.context.client_version = Some(version.into());
        self
    }

    pub fn request_id(mut self, id: Value) -> Self {
        self.context.request_id = Some(id);
        self
    }

    pub fn build(self) -> ToolContext {
        self.context
    }
}
