//! Result formatting: success envelopes, failure results and text blocks.

use crate::error::InvocationError;
use crate::mcp::ToolResult;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

/// The identifying arguments of a call, in declaration order.
///
/// They are echoed in success envelopes and quoted in error text. Secrets
/// never belong here.
///
/// ```
/// use pubsub_admin_mcp::format::KeyArguments;
///
/// let args = KeyArguments::new()
///     .with("principalName", "alice")
///     .with("roles", ["ADMIN"]);
///
/// assert_eq!(args.to_string(), r#"principalName=alice, roles=["ADMIN"]"#);
/// let envelope = args.envelope("added");
/// assert_eq!(envelope["status"], "added");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyArguments {
    entries: Vec<(&'static str, Value)>,
}

impl KeyArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.entries.push((name, value));
        self
    }

    /// The `fields` present in an unparsed argument object, as supplied.
    pub fn from_raw(raw: &Value, fields: &[&'static str]) -> Self {
        let entries = fields
            .iter()
            .filter_map(|field| raw.get(*field).map(|value| (*field, value.clone())))
            .collect();
        Self { entries }
    }

    /// Adds the entry only when `value` is present.
    pub fn with_optional<T: Serialize>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn to_object(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    /// The success envelope: every key argument plus `status`.
    pub fn envelope(&self, status: &str) -> Map<String, Value> {
        let mut object = self.to_object();
        object.insert("status".to_string(), Value::String(status.to_string()));
        object
    }
}

impl fmt::Display for KeyArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::String(s) => write!(f, "{}={}", name, s)?,
                other => write!(f, "{}={}", name, other)?,
            }
        }
        Ok(())
    }
}

/// Success result whose JSON is the envelope of `arguments` plus `extra`.
pub fn envelope_result(arguments: &KeyArguments, status: &str, extra: Map<String, Value>) -> ToolResult {
    let mut object = arguments.envelope(status);
    object.extend(extra);
    ToolResult::success_json(Value::Object(object))
}

/// Error text: `"{tool} failed [{args}]: {detail}"`, without the bracket
/// when there are no key arguments.
pub fn failure_message(tool: &str, arguments: &KeyArguments, error: &InvocationError) -> String {
    if arguments.is_empty() {
        format!("{} failed: {}", tool, error)
    } else {
        format!("{} failed [{}]: {}", tool, arguments, error)
    }
}

/// Flagged error result with a structured `error` object next to the text.
pub fn failure(tool: &str, arguments: &KeyArguments, error: &InvocationError) -> ToolResult {
    let mut detail = json!({
        "kind": error.kind(),
        "tool": tool,
        "arguments": Value::Object(arguments.to_object()),
        "message": error.to_string(),
    });
    if let Some(reason) = error.reason() {
        detail["reason"] = json!(reason);
    }

    ToolResult::error(failure_message(tool, arguments, error))
        .with_structured(json!({ "error": detail }))
}

/// Builds an indented, line-oriented text block.
#[derive(Debug, Default)]
pub struct TextBlock {
    out: String,
}

impl TextBlock {
    pub fn new(title: &str) -> Self {
        let mut block = Self::default();
        block.out.push_str(title);
        block
    }

    pub fn line(&mut self, indent: usize, text: impl fmt::Display) -> &mut Self {
        self.out.push('\n');
        for _ in 0..indent {
            self.out.push_str("  ");
        }
        self.out.push_str(&text.to_string());
        self
    }

    pub fn field(&mut self, indent: usize, label: &str, value: impl fmt::Display) -> &mut Self {
        self.line(indent, format_args!("{}: {}", label, value))
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Renders items as `[A, B]`.
pub fn bracketed<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let items: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::RemoteError;
    use std::time::Duration;

    #[test]
    fn test_envelope_preserves_order_and_adds_status() {
        let args = KeyArguments::new().with("path", "secure/");
        assert_eq!(
            Value::Object(args.envelope("isolated")),
            json!({"path": "secure/", "status": "isolated"})
        );
    }

    #[test]
    fn test_with_optional_skips_none() {
        let args = KeyArguments::new()
            .with("principalName", "alice")
            .with_optional("lockingPrincipal", None::<String>);
        assert!(args.get("lockingPrincipal").is_none());
        assert_eq!(args.get("principalName"), Some(&json!("alice")));
    }

    #[test]
    fn test_from_raw_keeps_supplied_fields_only() {
        let raw = json!({"password": "x", "roles": "ADMIN", "principalName": "alice"});
        let args = KeyArguments::from_raw(&raw, &["principalName", "roles", "lockingPrincipal"]);
        assert_eq!(args.to_string(), "principalName=alice, roles=ADMIN");
        assert!(args.get("password").is_none());

        assert!(KeyArguments::from_raw(&json!([1]), &["path"]).is_empty());
    }

    #[test]
    fn test_failure_message_shapes() {
        let args = KeyArguments::new().with("path", "secure/");
        let error = InvocationError::Timeout(Duration::from_secs(10));
        assert_eq!(
            failure_message("isolate_path", &args, &error),
            "isolate_path failed [path=secure/]: timed out after 10 seconds"
        );
        assert_eq!(
            failure_message("get_security", &KeyArguments::new(), &error),
            "get_security failed: timed out after 10 seconds"
        );
    }

    #[test]
    fn test_failure_structured_content() {
        let args = KeyArguments::new().with("name", "edge");
        let error: InvocationError = RemoteError::already_exists("Remote server 'edge' already exists").into();
        let result = failure("create_remote_server", &args, &error);

        assert!(result.is_error());
        let detail = &result.structured_content.unwrap()["error"];
        assert_eq!(detail["kind"], "remote");
        assert_eq!(detail["reason"], "already_exists");
        assert_eq!(detail["tool"], "create_remote_server");
        assert_eq!(detail["arguments"]["name"], "edge");
        assert_eq!(detail["message"], "Remote server 'edge' already exists");
    }

    #[test]
    fn test_text_block() {
        let mut block = TextBlock::new("Roles");
        block.line(1, "ADMIN").field(2, "includes", bracketed(["A", "B"]));
        assert_eq!(block.finish(), "Roles\n  ADMIN\n    includes: [A, B]");
    }
}
