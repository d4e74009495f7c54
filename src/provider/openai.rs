//! OpenAI-compatible Chat Completions streaming provider.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::ChatError;
use crate::types::{FinishReason, Message, ResponseFragment, ToolCallFragment};

use super::http::{bearer_headers, parse_sse_line, shared_client, status_to_error, SseLine};
use super::{FragmentStream, ModelProvider, ProviderRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut obj = Map::new();
        obj.insert("model".into(), self.model.clone().into());
        obj.insert("messages".into(), messages.into());
        obj.insert("stream".into(), true.into());

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        // Sampling extensions understood by vLLM-style servers.
        if let Some(top_k) = settings.top_k {
            obj.insert("top_k".into(), top_k.into());
        }
        if let Some(min_p) = settings.min_p {
            obj.insert("min_p".into(), min_p.into());
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
            obj.insert("tool_choice".into(), "auto".into());
        }

        Value::Object(obj)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_chat(&self, request: &ProviderRequest) -> Result<FragmentStream, ChatError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "OpenAI stream_chat"
        );

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ChatError::Network(e));
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                // Split on raw bytes so multi-byte characters spanning two
                // network chunks are decoded intact.
                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=line_end).collect();
                    match parse_stream_line(&String::from_utf8_lossy(&line_bytes)) {
                        LineOutcome::Skip => {}
                        LineOutcome::Fragment(fragment) => yield Ok(fragment),
                        LineOutcome::Done => return,
                        LineOutcome::Failed(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }

            // Body closed without a trailing newline after its last line.
            if !buffer.is_empty() {
                match parse_stream_line(&String::from_utf8_lossy(&buffer)) {
                    LineOutcome::Fragment(fragment) => yield Ok(fragment),
                    LineOutcome::Failed(err) => yield Err(err),
                    LineOutcome::Skip | LineOutcome::Done => {}
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

enum LineOutcome {
    Skip,
    Fragment(ResponseFragment),
    Done,
    Failed(ChatError),
}

fn parse_stream_line(line: &str) -> LineOutcome {
    let data = match parse_sse_line(line) {
        SseLine::Skip => return LineOutcome::Skip,
        SseLine::Done => return LineOutcome::Done,
        SseLine::Data(data) => data,
    };
    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(parsed) => match parsed.error {
            Some(error) => LineOutcome::Failed(ChatError::Stream(error_message(&error))),
            None => parsed
                .into_fragment()
                .map_or(LineOutcome::Skip, LineOutcome::Fragment),
        },
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream chunk");
            LineOutcome::Skip
        }
    }
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    s.parse().ok()
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Serialize a transcript message in Chat Completions shape.
pub(crate) fn message_to_openai(msg: &Message) -> Value {
    match msg {
        Message::System { content } => json!({ "role": "system", "content": content }),
        Message::User { content } => json!({ "role": "user", "content": content }),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut obj = Map::new();
            obj.insert("role".into(), "assistant".into());
            obj.insert(
                "content".into(),
                content.clone().map(Value::String).unwrap_or(Value::Null),
            );
            if !tool_calls.is_empty() {
                let tc_json: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments,
                            }
                        })
                    })
                    .collect();
                obj.insert("tool_calls".into(), tc_json.into());
            }
            Value::Object(obj)
        }
        Message::Tool {
            content,
            tool_call_id,
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
    }
}

// OpenAI API stream types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

impl OpenAiStreamChunk {
    /// First choice only; chunks without choices (usage trailers) yield nothing.
    fn into_fragment(self) -> Option<ResponseFragment> {
        let choice = self.choices.into_iter().next()?;
        let delta = choice.delta.unwrap_or_default();
        Some(ResponseFragment {
            content: delta.content,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
            tool_calls: delta.tool_calls.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiStreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}
