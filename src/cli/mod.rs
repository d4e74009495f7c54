//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ChatConfig;

/// Streaming chat client for MCP tool servers
#[derive(Parser, Debug)]
#[command(name = "mcp-chat", version, about = "Chat with a model that can call MCP tools")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the model (interactive unless a prompt is given)
    Chat(ChatArgs),
    /// Run the HTTP API server
    Serve(ServeArgs),
    /// Connect to the MCP server and list its tools
    Tools,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model name, overriding the configured one
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// One-shot prompt; omit for an interactive session
    pub prompt: Option<String>,
}

impl ChatArgs {
    /// Overlay command-line overrides on the loaded config.
    pub fn apply(&self, config: &mut ChatConfig) {
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if let Some(system) = &self.system {
            config.chat.system_message = system.clone();
        }
        if let Some(t) = self.temperature {
            config.generation.temperature = Some(t);
        }
        if let Some(max) = self.max_tokens {
            config.generation.max_tokens = Some(max);
        }
    }
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Bind address, overriding the configured one
    #[arg(long)]
    pub host: Option<String>,

    /// Port, overriding the configured one
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
