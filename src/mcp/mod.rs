//! Model Context Protocol client and tool registry.

pub mod client;
pub mod registry;

pub use client::McpClient;
pub use registry::McpToolRegistry;
