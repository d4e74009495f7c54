//! Turn state and per-turn reporting types.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::FinishReason;

/// Turn loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    AwaitingModel,
    Streaming,
    DispatchingTools,
    Done,
}

/// Wall-clock duration of one dispatched tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolTiming {
    pub tool_name: String,
    pub execution_time: f64,
    pub success: bool,
}

/// Report produced when a turn reaches `DONE`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TurnSummary {
    /// Content of the final model response.
    pub content: String,
    pub finish_reason: Option<FinishReason>,
    /// Error text also carried by the `complete` event.
    pub error: Option<String>,
    /// Set when the last response stream failed mid-read.
    pub partial: bool,
    pub rounds: usize,
    /// Seconds from turn start to `DONE`.
    pub total_time: f64,
    pub tool_timings: Vec<ToolTiming>,
    /// Seconds from turn start to the last closed thinking span.
    pub thinking_time: Option<f64>,
}

impl TurnSummary {
    /// Sum of tool durations in seconds.
    pub fn tool_time(&self) -> f64 {
        self.tool_timings.iter().map(|t| t.execution_time).sum()
    }

    pub fn tool_count(&self) -> usize {
        self.tool_timings.len()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
