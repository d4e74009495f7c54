//! Turn loop controller.
//!
//! A turn runs `AWAITING_MODEL -> STREAMING -> (DISPATCHING_TOOLS ->
//! AWAITING_MODEL)* -> DONE`. Each round streams one model response,
//! appends it to the transcript, and dispatches its tool calls one at a time
//! in index order. The turn ends on the first response with no tool calls.

use std::sync::Arc;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::{ToolDispatcher, ToolRegistry};
use crate::types::{FinishReason, GenerationSettings, Message};

use super::accumulator::{AccumulatedResponse, DeltaAccumulator};
use super::events::StreamEvent;
use super::thinking::{ClassifiedChunk, SpanClassifier, SpanKind};
use super::transcript::Transcript;
use super::types::{ToolTiming, TurnState, TurnSummary};

/// Drives turns for one conversation. Owns the transcript.
pub struct TurnController {
    provider: Arc<dyn ModelProvider>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolDefinition>,
    settings: GenerationSettings,
    max_rounds: Option<usize>,
    transcript: Transcript,
}

impl TurnController {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<dyn ToolRegistry>,
        transcript: Transcript,
    ) -> Self {
        Self {
            provider,
            dispatcher: ToolDispatcher::new(registry),
            tools: Vec::new(),
            settings: GenerationSettings::default(),
            max_rounds: None,
            transcript,
        }
    }

    /// Tool schemas sent with every model request.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Stop after `max_rounds` model responses. `None` means unbounded.
    pub fn with_max_rounds(mut self, max_rounds: Option<usize>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Run one turn for `user_input`, passing every event to `sink` as it
    /// happens. The last event is always `complete`.
    pub async fn run_turn<F>(&mut self, user_input: &str, mut sink: F) -> TurnSummary
    where
        F: FnMut(StreamEvent) + Send,
    {
        let started = Instant::now();
        self.transcript.push(Message::user(user_input));

        let mut summary = TurnSummary::default();
        let mut last_close: Option<Instant> = None;

        loop {
            if self.max_rounds.is_some_and(|max| summary.rounds >= max) {
                let message = format!("Error: stopped after {} model rounds", summary.rounds);
                warn!(rounds = summary.rounds, "round limit reached");
                summary.error = Some(message);
                break;
            }
            summary.rounds += 1;

            debug!(
                state = %TurnState::AwaitingModel,
                round = summary.rounds,
                messages = self.transcript.len(),
                "requesting model stream"
            );
            let request = ProviderRequest {
                messages: self.transcript.messages().to_vec(),
                tools: self.tools.clone(),
                settings: self.settings.clone(),
            };
            let mut stream = match self.provider.stream_chat(&request).await {
                Ok(stream) => stream,
                Err(e) => {
                    let err = ChatError::StreamCreation(e.to_string());
                    warn!(error = %err, "model stream could not be created");
                    summary.error = Some(format!("Error: {err}"));
                    summary.finish_reason = Some(FinishReason::Error);
                    break;
                }
            };

            debug!(state = %TurnState::Streaming, round = summary.rounds, "reading model stream");
            let mut accumulator = DeltaAccumulator::new();
            let mut classifier = SpanClassifier::new();
            let response: AccumulatedResponse = loop {
                match stream.next().await {
                    Some(Ok(fragment)) => {
                        if let Some(text) = fragment.content.as_deref() {
                            emit_chunk(classifier.classify(text), &mut sink);
                        }
                        accumulator.push(&fragment);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "model stream failed mid-read");
                        break accumulator.fail(e.to_string());
                    }
                    None => break accumulator.finish(),
                }
            };
            emit_chunk(classifier.finish(), &mut sink);
            if let Some(closed) = classifier.close_times().last() {
                last_close = Some(*closed);
            }

            self.transcript.push(Message::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            summary.content = response.content;
            summary.finish_reason = response.finish_reason;

            if response.error.is_some() {
                summary.partial = true;
                break;
            }
            if response.tool_calls.is_empty() {
                break;
            }

            debug!(
                state = %TurnState::DispatchingTools,
                calls = response.tool_calls.len(),
                "dispatching tool calls"
            );
            for call in &response.tool_calls {
                sink(StreamEvent::tool_call(&call.name, call.parsed_arguments()));
            }
            for call in &response.tool_calls {
                let result = self.dispatcher.dispatch(&call.name, &call.arguments).await;
                sink(StreamEvent::tool_result(&result));
                summary.tool_timings.push(ToolTiming {
                    tool_name: result.tool_name.clone(),
                    execution_time: result.execution_time_seconds,
                    success: result.success,
                });
                self.transcript
                    .push(Message::tool_result(&call.id, result.result_text));
            }
        }

        summary.total_time = started.elapsed().as_secs_f64();
        summary.thinking_time =
            last_close.map(|closed| closed.saturating_duration_since(started).as_secs_f64());

        info!(
            state = %TurnState::Done,
            rounds = summary.rounds,
            tools = summary.tool_count(),
            total_secs = summary.total_time,
            error = summary.error.as_deref(),
            "turn finished"
        );
        sink(StreamEvent::complete(summary.error.clone()));
        summary
    }
}

fn emit_chunk<F: FnMut(StreamEvent)>(chunk: ClassifiedChunk, sink: &mut F) {
    for span in chunk.spans {
        sink(match span.kind {
            SpanKind::Thinking => StreamEvent::thinking(span.text),
            SpanKind::Visible => StreamEvent::content(span.text),
        });
    }
}
