//! Tool result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a tool execution.
///
/// Failures are results too: they set `isError` and usually carry a
/// machine-readable `structuredContent` next to the text.
///
/// # Examples
///
/// ```
/// use pubsub_admin_mcp::mcp::ToolResult;
/// use serde_json::json;
///
/// let result = ToolResult::success_json(json!({"path": "secure/", "status": "isolated"}));
/// assert!(result.is_success());
/// assert_eq!(result.structured_content.unwrap()["status"], "isolated");
///
/// let result = ToolResult::error("Something went wrong");
/// assert!(result.is_error());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
    pub is_error: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "structuredContent")]
    pub structured_content: Option<Value>,
}

impl ToolResult {
    pub fn success(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: None,
            structured_content: None,
        }
    }

    pub fn success_text(text: impl Into<String>) -> Self {
        Self::success(vec![ToolContent::text(text)])
    }

    /// Success carrying `value` both as text and as structured content.
    pub fn success_json(value: Value) -> Self {
        Self {
            content: vec![ToolContent::text(value.to_string())],
            is_error: None,
            structured_content: Some(value),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            is_error: Some(true),
            structured_content: None,
        }
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// Text of the first content block.
    pub fn text(&self) -> Option<&str> {
        self.content.first().and_then(ToolContent::as_text)
    }
}

/// Content returned by a tool. Only text is produced here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
        }
    }
}
