//! Tool registry capability and the in-process implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::Tool;
use crate::error::ChatError;
use crate::provider::ToolDefinition;

/// Source of tool schemas and executor of named tool calls.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Schemas advertised to the model.
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError>;

    /// Invoke `name` with already-parsed JSON arguments, returning result text.
    async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<String, ChatError>;

    /// Establish the backing session, returning the tools it offers.
    async fn connect(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        self.list_tools().await
    }

    /// Release the backing session.
    async fn disconnect(&self) {}
}

/// Registry over in-process [`Tool`] implementations.
#[derive(Default, Clone)]
pub struct LocalToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl LocalToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration with the same name replaces the earlier one.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolRegistry for LocalToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        Ok(self
            .order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect())
    }

    async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<String, ChatError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ChatError::tool(name, "unknown tool"))?;
        debug!(tool = name, "invoking local tool");
        tool.execute(&ToolArguments::new(arguments)).await
    }
}
