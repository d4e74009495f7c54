//! Reassembles indexed response fragments into content and complete tool calls.

use tracing::warn;

use crate::types::{FinishReason, ResponseFragment, ToolCallFragment, ToolCallRequest};

/// Furthest a new tool-call index may land past the current slots. Fragments
/// beyond it are malformed and skipped rather than padded.
pub const MAX_INDEX_GAP: usize = 16;

/// Accumulation cell for one streamed tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallSlot {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallSlot {
    /// A call is dispatchable only once both id and name arrived.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }

    fn apply(&mut self, fragment: &ToolCallFragment) {
        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            self.id = id.to_string();
        }
        if let Some(function) = &fragment.function {
            if let Some(name) = function.name.as_deref().filter(|n| !n.is_empty()) {
                self.name = name.to_string();
            }
            if let Some(arguments) = &function.arguments {
                self.arguments.push_str(arguments);
            }
        }
    }
}

/// What one model response amounted to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedResponse {
    pub content: String,
    /// Complete calls in stream-index order.
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<FinishReason>,
    /// Set when the stream failed mid-read; `content` is then partial.
    pub error: Option<String>,
}

impl AccumulatedResponse {
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-response accumulator. Create one per model stream.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    content: String,
    slots: Vec<ToolCallSlot>,
    finish_reason: Option<FinishReason>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment in.
    pub fn push(&mut self, fragment: &ResponseFragment) {
        if let Some(text) = &fragment.content {
            self.content.push_str(text);
        }
        if let Some(reason) = fragment.finish_reason {
            self.finish_reason = Some(reason);
        }
        for call in &fragment.tool_calls {
            if call.index > self.slots.len().saturating_add(MAX_INDEX_GAP) {
                warn!(
                    index = call.index,
                    slots = self.slots.len(),
                    "skipping tool-call fragment with out-of-range index"
                );
                continue;
            }
            if call.index >= self.slots.len() {
                self.slots.resize_with(call.index + 1, ToolCallSlot::default);
            }
            self.slots[call.index].apply(call);
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn slots(&self) -> &[ToolCallSlot] {
        &self.slots
    }

    /// End of stream: drop incomplete slots and emit complete calls in index order.
    pub fn finish(self) -> AccumulatedResponse {
        let tool_calls = self
            .slots
            .into_iter()
            .filter(ToolCallSlot::is_complete)
            .map(|slot| ToolCallRequest::new(slot.id, slot.name, slot.arguments))
            .collect();
        AccumulatedResponse {
            content: self.content,
            tool_calls,
            finish_reason: self.finish_reason,
            error: None,
        }
    }

    /// Stream failed mid-read. Content so far is kept; tool calls are
    /// discarded since their arguments may be truncated.
    pub fn fail(self, error: impl Into<String>) -> AccumulatedResponse {
        AccumulatedResponse {
            content: self.content,
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Error),
            error: Some(error.into()),
        }
    }
}
