//! Chat facade: conversations over a model provider and a tool registry.

pub mod api;
pub mod response;

pub use api::ChatApi;
pub use response::{ChatResponse, ConnectionInfo, HealthStatus, ResponseCollector, ToolUsage};
