//! Model provider trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::types::{GenerationSettings, Message, ResponseFragment};

/// Lazy, finite, non-restartable sequence of response fragments.
pub type FragmentStream = BoxStream<'static, Result<ResponseFragment, ChatError>>;

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Streaming model capability consumed by the turn loop.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Open a streaming response for the given transcript and tool schema.
    ///
    /// An `Err` here means no stream could be created. Errors yielded by the
    /// returned stream are read failures of an already-open response.
    async fn stream_chat(&self, request: &ProviderRequest) -> Result<FragmentStream, ChatError>;
}

/// Create the provider described by `config`.
pub fn create_provider(config: &ChatConfig) -> Result<Box<dyn ModelProvider>, ChatError> {
    let api_key = config
        .model
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ChatError::Authentication("Missing API key".into()))?;
    Ok(Box::new(openai::OpenAiProvider::new(
        config.model.model.clone(),
        api_key,
        Some(config.model.base_url.clone()),
    )))
}
