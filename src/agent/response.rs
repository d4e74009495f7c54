//! Aggregate response types returned by [`ChatApi`](super::ChatApi).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent_loop::{StreamEvent, TurnSummary};
use crate::tools::ERROR_MARKER;

/// One tool invocation made while answering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUsage {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub execution_time: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Complete, non-streaming answer to one chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    /// Visible text across all rounds; thinking text is excluded.
    pub content: String,
    pub tools_used: Vec<ToolUsage>,
    pub total_time: f64,
    pub thinking_time: Option<f64>,
    pub finish_reason: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of connecting the tool registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    pub success: bool,
    pub tool_count: usize,
    pub tools: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness report for the HTTP `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub connected: bool,
    pub tool_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Folds a turn's events into a [`ChatResponse`].
#[derive(Debug, Default)]
pub struct ResponseCollector {
    content: String,
    pending_arguments: VecDeque<serde_json::Value>,
    tools_used: Vec<ToolUsage>,
    error: Option<String>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Content { content, .. } => self.content.push_str(content),
            StreamEvent::Thinking { .. } => {}
            StreamEvent::ToolCall { tool_arguments, .. } => {
                self.pending_arguments.push_back(tool_arguments.clone());
            }
            StreamEvent::ToolResult {
                tool_name,
                tool_result,
                tool_success,
                execution_time,
                timestamp,
            } => self.tools_used.push(ToolUsage {
                name: tool_name.clone(),
                // tool_call events precede their results in the same order.
                arguments: self
                    .pending_arguments
                    .pop_front()
                    .unwrap_or_else(|| serde_json::json!({})),
                result: tool_result.clone(),
                execution_time: *execution_time,
                success: *tool_success,
                timestamp: *timestamp,
            }),
            StreamEvent::Complete { content, .. } => {
                if let Some(text) = content.as_deref().filter(|t| t.starts_with(ERROR_MARKER)) {
                    self.error = Some(text.to_string());
                }
            }
        }
    }

    /// Build the response. `summary` supplies timings and the model's finish
    /// reason when the turn ran to completion.
    ///
    /// A response cut off by a read failure keeps `success` but reports
    /// `finish_reason: "error"`.
    pub fn finish(self, total_time: f64, summary: Option<&TurnSummary>) -> ChatResponse {
        let success = self.error.is_none();
        let finish_reason = match summary {
            _ if !success => "error".to_string(),
            Some(s) if s.partial => "error".to_string(),
            Some(s) => s
                .finish_reason
                .map_or_else(|| "stop".to_string(), |r| r.to_string()),
            None => "stop".to_string(),
        };
        ChatResponse {
            content: self.content,
            tools_used: self.tools_used,
            total_time,
            thinking_time: summary.and_then(|s| s.thinking_time),
            finish_reason,
            timestamp: Utc::now(),
            success,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolExecutionResult;
    use crate::types::FinishReason;
    use serde_json::json;

    #[test]
    fn collects_content_and_pairs_tool_arguments() {
        let mut collector = ResponseCollector::new();
        collector.push(&StreamEvent::thinking("<think>hmm</think>"));
        collector.push(&StreamEvent::tool_call("search", json!({"q": "rust"})));
        collector.push(&StreamEvent::tool_result(&ToolExecutionResult {
            tool_name: "search".into(),
            result_text: "found".into(),
            success: true,
            execution_time_seconds: 0.5,
            timestamp: Utc::now(),
        }));
        collector.push(&StreamEvent::content("Answer"));
        collector.push(&StreamEvent::complete(None));

        let response = collector.finish(1.0, None);
        assert!(response.success);
        assert_eq!(response.content, "Answer");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.tools_used.len(), 1);
        assert_eq!(response.tools_used[0].arguments, json!({"q": "rust"}));
    }

    #[test]
    fn error_complete_marks_failure() {
        let mut collector = ResponseCollector::new();
        collector.push(&StreamEvent::complete(Some("Error: Failed to create stream: 500".into())));
        let response = collector.finish(0.1, None);
        assert!(!response.success);
        assert_eq!(response.finish_reason, "error");
        assert!(response.error.unwrap().contains("Failed to create stream"));
    }

    #[test]
    fn finish_reason_comes_from_the_turn() {
        let mut collector = ResponseCollector::new();
        collector.push(&StreamEvent::content("truncated answ"));
        collector.push(&StreamEvent::complete(None));
        let summary = TurnSummary {
            finish_reason: Some(FinishReason::Length),
            ..Default::default()
        };
        let response = collector.finish(0.2, Some(&summary));
        assert!(response.success);
        assert_eq!(response.finish_reason, "length");
    }

    #[test]
    fn cut_off_stream_reports_error_finish_but_stays_successful() {
        let mut collector = ResponseCollector::new();
        collector.push(&StreamEvent::content("partial"));
        collector.push(&StreamEvent::complete(None));
        let summary = TurnSummary {
            content: "partial".into(),
            finish_reason: Some(FinishReason::Error),
            partial: true,
            ..Default::default()
        };
        let response = collector.finish(0.3, Some(&summary));
        assert!(response.success);
        assert!(response.error.is_none());
        assert_eq!(response.finish_reason, "error");
        assert_eq!(response.content, "partial");
    }
}
