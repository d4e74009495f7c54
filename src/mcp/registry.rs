//! [`ToolRegistry`] backed by an MCP server session.

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::client::McpClient;
use crate::config::McpConfig;
use crate::error::ChatError;
use crate::provider::ToolDefinition;
use crate::tools::ToolRegistry;

/// Registry that forwards invocations to a connected MCP server and caches
/// its tool list from the handshake.
pub struct McpToolRegistry {
    config: McpConfig,
    client: Mutex<Option<McpClient>>,
    tools: RwLock<Vec<ToolDefinition>>,
}

impl McpToolRegistry {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            tools: RwLock::new(Vec::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub async fn is_connected(&self) -> bool {
        self.client
            .lock()
            .await
            .as_ref()
            .is_some_and(|client| !client.is_closed())
    }
}

#[async_trait]
impl ToolRegistry for McpToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        Ok(self.tools.read().await.clone())
    }

    async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<String, ChatError> {
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| ChatError::InvalidState("Not connected to MCP server".into()))?;
        client.call_tool(name, arguments).await
    }

    /// Connect (or reconnect) and refresh the cached tool list.
    async fn connect(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        let client = McpClient::connect(&self.config.url, self.config.timeout()).await?;
        let tools = client.list_tools().await?;
        info!(url = %self.config.url, tools = tools.len(), "connected to MCP server");

        if let Some(previous) = self.client.lock().await.replace(client) {
            previous.disconnect().await;
        }
        *self.tools.write().await = tools.clone();
        Ok(tools)
    }

    async fn disconnect(&self) {
        if let Some(client) = self.client.lock().await.take() {
            debug!(url = %client.url(), "disconnecting from MCP server");
            client.disconnect().await;
        }
        self.tools.write().await.clear();
    }
}
