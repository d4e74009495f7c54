//! Convenience re-exports for common use.

pub use crate::agent::{ChatApi, ChatResponse, ToolUsage};
pub use crate::agent_loop::{StreamEvent, Transcript, TurnController, TurnSummary};
pub use crate::config::ChatConfig;
pub use crate::error::{ChatError, Result};
pub use crate::provider::{ModelProvider, ToolDefinition};
pub use crate::tools::{FnTool, LocalToolRegistry, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{FinishReason, GenerationSettings, Message};
