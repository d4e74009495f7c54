//! mcp-chat binary entry point.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mcp_chat::agent::ChatApi;
use mcp_chat::agent_loop::TurnController;
use mcp_chat::cli::{ChatArgs, Cli, Commands, ServeArgs};
use mcp_chat::config::ChatConfig;
use mcp_chat::error::{ChatError, Result};
use mcp_chat::ui::TerminalPrinter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let result = match ChatConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Chat(args) => handle_chat(config, args).await,
            Commands::Serve(args) => handle_serve(config, args).await,
            Commands::Tools => handle_tools(config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(mut config: ChatConfig, args: ChatArgs) -> Result<()> {
    args.apply(&mut config);
    let api = ChatApi::from_config(config)?;
    let mut printer = TerminalPrinter::stdout(api.config().ui.clone());

    if let Some(prompt) = args.prompt {
        connect(&api, &mut printer).await?;
        let mut controller = api.controller(None).await;
        run_turn(&mut controller, &prompt, &mut printer).await?;
        api.disconnect().await;
        return Ok(());
    }

    printer.header()?;
    connect(&api, &mut printer).await?;
    // One controller for the whole session keeps the conversation in memory.
    let mut controller = api.controller(None).await;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        printer.prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if api.config().ui.is_exit_command(input) {
            break;
        }

        printer.processing()?;
        run_turn(&mut controller, input, &mut printer).await?;
        printer.separator()?;
    }

    printer.goodbye()?;
    api.disconnect().await;
    Ok(())
}

async fn connect(api: &ChatApi, printer: &mut TerminalPrinter<std::io::Stdout>) -> Result<()> {
    printer.connecting(&api.config().mcp.url)?;
    let info = api.connect().await;
    if info.success {
        printer.connected(info.tool_count)?;
    } else {
        // Chat still works without tools.
        let reason = info.error.unwrap_or_default();
        printer.error(&format!("Failed to connect to MCP server: {reason}"))?;
    }
    Ok(())
}

async fn run_turn(
    controller: &mut TurnController,
    input: &str,
    printer: &mut TerminalPrinter<std::io::Stdout>,
) -> Result<()> {
    let summary = controller
        .run_turn(input, |event| {
            if let Err(e) = printer.event(&event) {
                debug!(error = %e, "failed to write event");
            }
        })
        .await;
    printer.timing(&summary)?;
    Ok(())
}

async fn handle_serve(mut config: ChatConfig, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let host = config.server.host.clone();
    let port = config.server.port;
    let api = Arc::new(ChatApi::from_config(config)?);
    mcp_chat::server::serve(api, &host, port).await
}

async fn handle_tools(config: ChatConfig) -> Result<()> {
    let api = ChatApi::from_config(config)?;
    let info = api.connect().await;
    if !info.success {
        return Err(ChatError::Mcp(info.error.unwrap_or_else(|| "connection failed".into())));
    }
    for tool in api.available_tools().await {
        if tool.description.is_empty() {
            println!("{}", tool.name);
        } else {
            println!("{}: {}", tool.name, tool.description);
        }
    }
    api.disconnect().await;
    Ok(())
}
