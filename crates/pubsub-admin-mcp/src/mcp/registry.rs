//! Thread-safe tool registry.

use super::{Tool, ToolDefinition};
use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of tools, keyed by name.
///
/// Cloning is cheap and clones share the same tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &"<HashMap<String, Arc<dyn Tool>>>")
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register<T: Tool + 'static>(&self, tool: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool)).await
    }

    pub async fn register_arc(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();

        if tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }

        tools.insert(name, tool);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        let tools = self.tools.read().await;
        tools.contains_key(name)
    }

    /// Tool definitions sorted by name.
    pub async fn list(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut definitions: Vec<ToolDefinition> = tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().map(|s| s.to_string()),
                input_schema: tool.input_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub async fn names(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        let tools = self.tools.read().await;
        tools.len()
    }
}
