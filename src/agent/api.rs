//! High-level chat facade used by the CLI and the HTTP server.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::agent_loop::{StreamEvent, Transcript, TurnController};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::provider::{ModelProvider, ToolDefinition};
use crate::tools::ToolRegistry;
use crate::types::Message;

use super::response::{ChatResponse, ConnectionInfo, HealthStatus, ResponseCollector};

#[derive(Debug, Default)]
struct ConnectionState {
    connected: bool,
    tools: Vec<ToolDefinition>,
}

/// Model provider plus tool registry, with per-request conversations.
///
/// Every `chat`/`chat_stream` call builds its own [`TurnController`], so
/// concurrent requests never share a transcript.
pub struct ChatApi {
    config: ChatConfig,
    provider: Arc<dyn ModelProvider>,
    registry: Arc<dyn ToolRegistry>,
    state: RwLock<ConnectionState>,
}

impl ChatApi {
    pub fn new(
        config: ChatConfig,
        provider: Arc<dyn ModelProvider>,
        registry: Arc<dyn ToolRegistry>,
    ) -> Self {
        Self {
            config,
            provider,
            registry,
            state: RwLock::new(ConnectionState::default()),
        }
    }

    /// Build the OpenAI-compatible provider and MCP registry described by `config`.
    #[cfg(feature = "mcp")]
    pub fn from_config(config: ChatConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let provider: Arc<dyn ModelProvider> = Arc::from(crate::provider::create_provider(&config)?);
        let registry = Arc::new(crate::mcp::McpToolRegistry::new(config.mcp.clone()));
        Ok(Self::new(config, provider, registry))
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Connect the tool registry and cache its tools.
    pub async fn connect(&self) -> ConnectionInfo {
        match self.registry.connect().await {
            Ok(tools) => {
                let names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
                let mut state = self.state.write().await;
                state.connected = true;
                state.tools = tools;
                ConnectionInfo {
                    success: true,
                    tool_count: names.len(),
                    tools: names,
                    timestamp: Utc::now(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to connect tool registry");
                ConnectionInfo {
                    success: false,
                    tool_count: 0,
                    tools: Vec::new(),
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if state.connected {
            self.registry.disconnect().await;
            state.connected = false;
            state.tools.clear();
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    pub async fn available_tools(&self) -> Vec<ToolDefinition> {
        self.state.read().await.tools.clone()
    }

    /// Reports healthy once the registry is connected, connecting on demand.
    pub async fn health_check(&self) -> HealthStatus {
        let error = if self.is_connected().await {
            None
        } else {
            self.connect().await.error
        };
        let state = self.state.read().await;
        HealthStatus {
            status: if state.connected { "healthy" } else { "unhealthy" }.to_string(),
            connected: state.connected,
            tool_count: state.tools.len(),
            timestamp: Utc::now(),
            error,
        }
    }

    /// A fresh controller seeded with `history` (or just the system message).
    ///
    /// Connects first if needed; a failed connection leaves the turn without tools.
    pub async fn controller(&self, history: Option<Vec<Message>>) -> TurnController {
        if !self.is_connected().await {
            self.connect().await;
        }
        let system = self.config.chat.system_message.clone();
        let transcript = match history {
            Some(history) => Transcript::from_history(system, history),
            None => Transcript::new(system),
        };
        TurnController::new(self.provider.clone(), self.registry.clone(), transcript)
            .with_tools(self.available_tools().await)
            .with_settings(self.config.generation.clone())
            .with_max_rounds(self.config.chat.max_rounds)
    }

    /// Stream the events of one turn. The stream ends after `complete`.
    pub async fn chat_stream(
        &self,
        message: impl Into<String>,
        history: Option<Vec<Message>>,
    ) -> BoxStream<'static, StreamEvent> {
        let message = message.into();
        let mut controller = self.controller(history).await;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            controller
                .run_turn(&message, |event| {
                    // Receiver dropped means the client went away; the turn still finishes.
                    let _ = tx.send(event);
                })
                .await;
        });

        UnboundedReceiverStream::new(rx).boxed()
    }

    /// Run one turn to completion and aggregate it.
    pub async fn chat(&self, message: &str, history: Option<Vec<Message>>) -> ChatResponse {
        let started = Instant::now();
        let mut controller = self.controller(history).await;
        let mut collector = ResponseCollector::new();
        let summary = controller
            .run_turn(message, |event| collector.push(&event))
            .await;
        debug!(rounds = summary.rounds, tools = summary.tool_count(), "chat finished");
        collector.finish(started.elapsed().as_secs_f64(), Some(&summary))
    }
}
