//! Shared test helpers: scripted provider and recording tool registry.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use mcp_chat::error::ChatError;
use mcp_chat::provider::{FragmentStream, ModelProvider, ProviderRequest, ToolDefinition};
use mcp_chat::tools::ToolRegistry;
use mcp_chat::types::{FinishReason, ResponseFragment, ToolCallFragment};

/// One step of a scripted response stream.
pub enum Step {
    Fragment(ResponseFragment),
    Fail(String),
}

/// One scripted model round.
pub enum Round {
    Stream(Vec<Step>),
    CreateError(String),
}

impl Round {
    /// A round that streams `chunks` as text and stops.
    pub fn text(chunks: &[&str]) -> Self {
        let mut steps: Vec<Step> = chunks
            .iter()
            .map(|c| Step::Fragment(ResponseFragment::text(*c)))
            .collect();
        steps.push(Step::Fragment(ResponseFragment::finish(FinishReason::Stop)));
        Round::Stream(steps)
    }

    /// A round that requests the given `(id, name, arguments)` calls, each
    /// streamed as a start fragment followed by two argument halves.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Self {
        let mut steps = Vec::new();
        for (index, (id, name, args)) in calls.iter().enumerate() {
            steps.push(Step::Fragment(ResponseFragment::tool_call(
                ToolCallFragment::start(index, *id, *name),
            )));
            let mid = args.len() / 2;
            steps.push(Step::Fragment(ResponseFragment::tool_call(
                ToolCallFragment::arguments(index, &args[..mid]),
            )));
            steps.push(Step::Fragment(ResponseFragment::tool_call(
                ToolCallFragment::arguments(index, &args[mid..]),
            )));
        }
        steps.push(Step::Fragment(ResponseFragment::finish(FinishReason::ToolCalls)));
        Round::Stream(steps)
    }
}

/// Provider that replays scripted rounds and records every request.
pub struct MockProvider {
    rounds: Mutex<VecDeque<Round>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new(rounds: Vec<Round>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn stream_chat(&self, request: &ProviderRequest) -> Result<FragmentStream, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let round = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Round::text(&["(no more scripted rounds)"]));
        match round {
            Round::CreateError(message) => Err(ChatError::api(500, message)),
            Round::Stream(steps) => {
                let items: Vec<Result<ResponseFragment, ChatError>> = steps
                    .into_iter()
                    .map(|step| match step {
                        Step::Fragment(f) => Ok(f),
                        Step::Fail(message) => Err(ChatError::Stream(message)),
                    })
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}

/// Registry that records invocations and answers from a fixed table.
#[derive(Default)]
pub struct MockRegistry {
    tools: Vec<ToolDefinition>,
    responses: HashMap<String, Result<String, String>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, Value)>>,
    log: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: &str, response: Result<&str, &str>) -> Self {
        self.tools.push(ToolDefinition {
            name: name.to_string(),
            description: format!("{name} tool"),
            parameters: json!({"type": "object", "properties": {}}),
        });
        self.responses.insert(
            name.to_string(),
            response.map(str::to_string).map_err(str::to_string),
        );
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// `start:<name>` / `end:<name>` entries in execution order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRegistry for MockRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        Ok(self.tools.clone())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ChatError> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        self.log.lock().unwrap().push(format!("start:{name}"));
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        self.log.lock().unwrap().push(format!("end:{name}"));
        match self.responses.get(name) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(ChatError::tool(name, message.clone())),
            None => Err(ChatError::tool(name, "unknown tool")),
        }
    }
}

/// Short names for event kinds, for ordering assertions.
pub fn kinds(events: &[mcp_chat::agent_loop::StreamEvent]) -> Vec<&'static str> {
    use mcp_chat::agent_loop::StreamEvent;
    events
        .iter()
        .map(|e| match e {
            StreamEvent::Content { .. } => "content",
            StreamEvent::Thinking { .. } => "thinking",
            StreamEvent::ToolCall { .. } => "tool_call",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::Complete { .. } => "complete",
        })
        .collect()
}
