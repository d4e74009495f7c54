//! Argument validation, timed invocation, and result classification for a
//! single tool call.
//!
//! Dispatch never fails: every outcome, including malformed arguments and
//! registry errors, becomes a [`ToolExecutionResult`] whose text is fed back
//! to the model.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::registry::ToolRegistry;

/// Prefix that marks a tool result as a failure.
pub const ERROR_MARKER: &str = "Error";

/// Outcome of one dispatched tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolExecutionResult {
    pub tool_name: String,
    pub result_text: String,
    pub success: bool,
    pub execution_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl ToolExecutionResult {
    fn new(tool_name: &str, result_text: String, execution_time_seconds: f64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: is_success(&result_text),
            result_text,
            execution_time_seconds,
            timestamp: Utc::now(),
        }
    }
}

/// Success classification: anything not starting with [`ERROR_MARKER`].
///
/// Prefix-only, so `"Error-free day"` counts as a failure while a result that
/// mentions an error mid-text counts as a success.
pub fn is_success(result_text: &str) -> bool {
    !result_text.starts_with(ERROR_MARKER)
}

/// Runs tool calls against a registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<dyn ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<dyn ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Validate `raw_arguments`, invoke `name`, and classify the result.
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> ToolExecutionResult {
        if raw_arguments.trim().is_empty() {
            warn!(tool = name, "empty tool arguments");
            return ToolExecutionResult::new(
                name,
                format!("{ERROR_MARKER}: Empty arguments for tool: {name}"),
                0.0,
            );
        }

        let arguments: serde_json::Value = match serde_json::from_str(raw_arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = name, raw = raw_arguments, error = %e, "unparseable tool arguments");
                return ToolExecutionResult::new(
                    name,
                    format!("{ERROR_MARKER} parsing tool arguments for {name}: {e}"),
                    0.0,
                );
            }
        };

        debug!(tool = name, "dispatching tool call");
        let started = Instant::now();
        let outcome = self.registry.invoke(name, arguments).await;
        let elapsed = started.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(text) => ToolExecutionResult::new(name, text, elapsed),
            Err(e) => ToolExecutionResult::new(name, format!("{ERROR_MARKER} calling tool: {e}"), elapsed),
        };
        debug!(
            tool = name,
            success = result.success,
            elapsed_secs = elapsed,
            "tool call finished"
        );
        result
    }
}
