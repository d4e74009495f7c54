//! MCP client over streamable HTTP.

use std::time::Duration;

use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ProtocolVersion, ResourceContents},
    service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError, ServiceExt},
    transport::{streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport},
};
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::provider::http::shared_client;
use crate::provider::ToolDefinition;
use crate::util::timeout::with_timeout;

type DynClientService = Box<dyn DynService<RoleClient>>;
pub type McpRunningService = RunningService<RoleClient, DynClientService>;

/// Session with one MCP server. Every request is bounded by `timeout`.
pub struct McpClient {
    url: String,
    timeout: Duration,
    session: McpRunningService,
}

impl McpClient {
    /// Run the MCP handshake against `url`.
    ///
    /// Tries the latest protocol version first and falls back to 2024-11-05
    /// when the server rejects the version.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, ChatError> {
        info!(url, "connecting to MCP server");
        let session = with_timeout(timeout, connect_with_protocol_fallback(url)).await?;
        Ok(Self {
            url: url.to_string(),
            timeout,
            session,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// List the server's tools as model-facing definitions.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        let tools = with_timeout(self.timeout, async {
            match self.session.list_all_tools().await {
                Ok(tools) => Ok(tools),
                Err(ServiceError::UnexpectedResponse) => self
                    .session
                    .list_tools(None)
                    .await
                    .map(|page| page.tools)
                    .map_err(|e| map_service_error("list_tools", e)),
                Err(e) => Err(map_service_error("list_tools", e)),
            }
        })
        .await?;

        debug!(count = tools.len(), "listed MCP tools");
        Ok(tools.into_iter().map(map_mcp_tool).collect())
    }

    /// Call a tool and return its textual result.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<String, ChatError> {
        let arguments = coerce_tool_arguments(arguments)?;
        let result = with_timeout(self.timeout, async {
            self.session
                .call_tool(CallToolRequestParams {
                    meta: None,
                    name: name.to_owned().into(),
                    arguments,
                    task: None,
                })
                .await
                .map_err(|e| map_service_error("call_tool", e))
        })
        .await?;

        map_call_result(name, result)
    }

    /// Close the session.
    pub async fn disconnect(self) {
        if let Err(e) = self.session.cancel().await {
            warn!(url = %self.url, error = %e, "error disconnecting from MCP server");
        }
    }
}

async fn connect_with_protocol_fallback(url: &str) -> Result<McpRunningService, ChatError> {
    let latest = ClientInfo {
        protocol_version: ProtocolVersion::LATEST,
        ..Default::default()
    };
    match serve(url, latest).await {
        Ok(session) => return Ok(session),
        Err(error) if should_retry_protocol_fallback(&error) => {
            debug!(url, "retrying MCP handshake with protocol 2024-11-05");
        }
        Err(error) => return Err(map_client_initialize_error(error)),
    }

    let fallback = ClientInfo {
        protocol_version: ProtocolVersion::V_2024_11_05,
        ..Default::default()
    };
    serve(url, fallback).await.map_err(map_client_initialize_error)
}

async fn serve(url: &str, client_info: ClientInfo) -> Result<McpRunningService, ClientInitializeError> {
    let config = StreamableHttpClientTransportConfig::with_uri(url.to_string());
    let transport = StreamableHttpClientTransport::with_client(shared_client().clone(), config);
    client_info.into_dyn().serve(transport).await
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_mcp_tool(tool: rmcp::model::Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        parameters: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

pub(crate) fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>, ChatError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                ChatError::InvalidArgument(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(ChatError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

/// Join textual content parts (text and text resources) with newlines.
pub(crate) fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

pub(crate) fn map_call_result(name: &str, result: CallToolResult) -> Result<String, ChatError> {
    let text = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = text
            .or_else(|| result.structured_content.as_ref().map(|v| v.to_string()))
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(ChatError::tool(name, message));
    }

    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(structured) = result.structured_content {
        return Ok(structured.to_string());
    }
    // Non-text parts (images, blobs) are passed through as JSON.
    Ok(serde_json::to_string(&result.content)?)
}

fn map_client_initialize_error(error: ClientInitializeError) -> ChatError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            ChatError::Mcp(format!("initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            ChatError::Mcp(format!("initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => ChatError::Mcp(format!(
            "initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => ChatError::Mcp("initialize cancelled".into()),
        other => ChatError::Mcp(format!("initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> ChatError {
    match error {
        ServiceError::McpError(error) => {
            ChatError::Mcp(format!("{context}: MCP error {}: {}", error.code.0, error.message))
        }
        ServiceError::TransportSend(error) => {
            ChatError::Mcp(format!("{context}: transport send failed: {error}"))
        }
        ServiceError::TransportClosed => ChatError::Mcp(format!("{context}: transport closed")),
        ServiceError::UnexpectedResponse => {
            ChatError::Mcp(format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            ChatError::Mcp(format!("{context}: request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => ChatError::Timeout(timeout.as_millis() as u64),
        other => ChatError::Mcp(format!("{context}: service error: {other}")),
    }
}
