//! Streaming fragment types produced by a model provider.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;

/// One incremental unit of a streaming model response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseFragment {
    /// Content text increment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Finish reason (only on the final fragment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Indexed, partially-populated tool-call increments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,
}

impl ResponseFragment {
    /// A fragment carrying only a content increment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    /// A fragment carrying a single tool-call increment.
    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }

    /// A fragment carrying only a finish reason.
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Default::default()
        }
    }
}

/// Partial tool-call data at a given stream index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFragment {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
}

impl ToolCallFragment {
    /// Opening fragment of a call: id and name, empty arguments.
    pub fn start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            function: Some(FunctionFragment {
                name: Some(name.into()),
                arguments: None,
            }),
        }
    }

    /// Continuation fragment carrying an argument text increment.
    pub fn arguments(index: usize, increment: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            function: Some(FunctionFragment {
                name: None,
                arguments: Some(increment.into()),
            }),
        }
    }
}

/// Partial function data of a tool-call fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
