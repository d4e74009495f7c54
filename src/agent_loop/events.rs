//! Events emitted while a turn runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::ToolExecutionResult;

/// One observable step of a turn, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Visible answer text.
    Content {
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Text inside a `<think>` span.
    Thinking {
        content: String,
        timestamp: DateTime<Utc>,
    },
    ToolCall {
        tool_name: String,
        tool_arguments: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    ToolResult {
        tool_name: String,
        tool_result: String,
        tool_success: bool,
        execution_time: f64,
        timestamp: DateTime<Utc>,
    },
    /// Last event of every turn. `content` carries error text when the turn failed.
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content {
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self::Thinking {
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_call(tool_name: impl Into<String>, tool_arguments: serde_json::Value) -> Self {
        Self::ToolCall {
            tool_name: tool_name.into(),
            tool_arguments,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_result(result: &ToolExecutionResult) -> Self {
        Self::ToolResult {
            tool_name: result.tool_name.clone(),
            tool_result: result.result_text.clone(),
            tool_success: result.success,
            execution_time: result.execution_time_seconds,
            timestamp: result.timestamp,
        }
    }

    pub fn complete(error: Option<String>) -> Self {
        Self::Complete {
            content: error,
            timestamp: Utc::now(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Content { timestamp, .. }
            | Self::Thinking { timestamp, .. }
            | Self::ToolCall { timestamp, .. }
            | Self::ToolResult { timestamp, .. }
            | Self::Complete { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Error text carried by a `complete` event.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Complete { content, .. } => content.as_deref(),
            _ => None,
        }
    }
}
