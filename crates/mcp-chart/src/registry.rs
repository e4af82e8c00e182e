//! Tool registry.
//!
//! Caches the tools the server advertised so invocations can be validated
//! locally before any request goes out.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::dispatch::{CallOptions, Dispatcher};
use crate::error::Result;
use crate::protocol::{ListToolsResult, ToolInfo, methods};
use crate::session::Session;

/// Cached tool descriptors keyed by name.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolInfo>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch `tools/list` and replace the cached set with the result.
    pub async fn refresh(
        &self,
        dispatcher: &Dispatcher,
        session: &Session,
        options: &CallOptions,
    ) -> Result<Vec<ToolInfo>> {
        let result = dispatcher
            .call(session, methods::TOOLS_LIST, Some(serde_json::json!({})), options)
            .await?;
        let listed: ListToolsResult = serde_json::from_value(result)?;

        tracing::info!(
            session = %session.token(),
            tool_count = listed.tools.len(),
            tools = %listed.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
            "listed MCP tools"
        );

        self.replace(listed.tools.clone());
        Ok(listed.tools)
    }

    /// Replace the cached set.
    pub fn replace(&self, tools: Vec<ToolInfo>) {
        let map = tools
            .into_iter()
            .map(|tool| (tool.name.clone(), tool))
            .collect();
        *self.tools.write() = map;
    }

    /// Drop every cached descriptor.
    pub fn clear(&self) {
        self.tools.write().clear();
    }

    /// Whether a tool with this name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Look up a descriptor.
    pub fn get(&self, name: &str) -> Option<ToolInfo> {
        self.tools.read().get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolInfo {
        ToolInfo {
            name: name.to_string(),
            description: None,
            input_schema: None,
        }
    }

    #[test]
    fn test_replace_and_lookup() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.replace(vec![tool("generate_pie_chart"), tool("generate_bar_chart")]);
        assert_eq!(registry.len(), 2);
        assert!(registry.has("generate_pie_chart"));
        assert!(!registry.has("generate_radar_chart"));
        assert_eq!(
            registry.names(),
            vec!["generate_bar_chart".to_string(), "generate_pie_chart".to_string()]
        );
        assert_eq!(registry.get("generate_bar_chart").unwrap().name, "generate_bar_chart");
    }

    #[test]
    fn test_replace_drops_previous_set() {
        let registry = ToolRegistry::new();
        registry.replace(vec![tool("old")]);
        registry.replace(vec![tool("new")]);
        assert!(!registry.has("old"));
        assert!(registry.has("new"));

        registry.clear();
        assert!(registry.is_empty());
    }
}
