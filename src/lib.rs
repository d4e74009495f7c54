//! mcp-chat: streaming chat orchestration between an OpenAI-compatible model
//! and tools exposed by an MCP server.
//!
//! A turn streams the model's answer, splits `<think>` spans from visible
//! text, reassembles tool calls from their fragments, runs the calls one at a
//! time against the tool registry, and feeds the results back until the model
//! answers without calling tools.
//!
//! # Quick Start
//!
//! ```no_run
//! use mcp_chat::prelude::*;
//!
//! # async fn example() -> mcp_chat::error::Result<()> {
//! let config = ChatConfig::load(None)?;
//! let api = ChatApi::from_config(config)?;
//! let response = api.chat("What's the weather in Paris?", None).await;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub mod ui;
