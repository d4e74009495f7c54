//! Terminal presentation of turn events.

use std::io::{self, Write};

use chrono::Local;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::agent_loop::{StreamEvent, TurnSummary};
use crate::config::UiConfig;

const RULE_WIDTH: usize = 50;

/// Writes styled turn output to a terminal (or any writer).
pub struct TerminalPrinter<W: Write> {
    out: W,
    config: UiConfig,
    /// Whether an assistant header is open for the current run of text.
    answering: bool,
}

impl TerminalPrinter<io::Stdout> {
    pub fn stdout(config: UiConfig) -> Self {
        Self::new(io::stdout(), config)
    }
}

impl<W: Write> TerminalPrinter<W> {
    pub fn new(out: W, config: UiConfig) -> Self {
        Self {
            out,
            config,
            answering: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn timestamp(&mut self) -> io::Result<()> {
        if self.config.show_timestamps {
            let now = Local::now().format("%H:%M:%S").to_string();
            queue!(
                self.out,
                SetAttribute(Attribute::Dim),
                Print(format!("[{now}] ")),
                SetAttribute(Attribute::Reset)
            )?;
        }
        Ok(())
    }

    fn rule(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            SetAttribute(Attribute::Dim),
            Print("─".repeat(RULE_WIDTH)),
            SetAttribute(Attribute::Reset),
            Print("\n")
        )
    }

    fn line(&mut self, color: Color, text: &str) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(color),
            Print(text),
            ResetColor,
            Print("\n")
        )
    }

    pub fn header(&mut self) -> io::Result<()> {
        if self.config.clear_screen_on_start {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        let version = env!("CARGO_PKG_VERSION");
        queue!(self.out, Print("\n"))?;
        self.line(Color::Cyan, &format!("MCP Chat v{version}"))?;
        queue!(self.out, Print("\n"))?;
        self.line(Color::DarkCyan, "* Type your message to start chatting")?;
        let exits = self.config.exit_commands.join(", ");
        self.line(Color::DarkCyan, &format!("* Commands: {exits} to exit"))?;
        queue!(self.out, Print("\n"))?;
        self.rule()?;
        self.out.flush()
    }

    pub fn connecting(&mut self, url: &str) -> io::Result<()> {
        self.line(Color::DarkCyan, &format!("~ Connecting to MCP server at {url}..."))?;
        self.out.flush()
    }

    pub fn connected(&mut self, tool_count: usize) -> io::Result<()> {
        self.line(Color::Green, &format!("✓ Connected - {tool_count} tools available"))?;
        self.out.flush()
    }

    pub fn separator(&mut self) -> io::Result<()> {
        queue!(self.out, Print("\n"))?;
        self.rule()?;
        self.out.flush()
    }

    /// Input prompt; the caller reads the line.
    pub fn prompt(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(Color::Green),
            SetAttribute(Attribute::Bold),
            Print("> You: "),
            SetAttribute(Attribute::Reset),
            ResetColor
        )?;
        self.out.flush()
    }

    pub fn processing(&mut self) -> io::Result<()> {
        queue!(self.out, Print("\n"))?;
        self.line(Color::Yellow, "~ Processing your input...")?;
        self.out.flush()
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        queue!(self.out, Print("\n"))?;
        self.timestamp()?;
        self.line(Color::Red, &format!("! Error: {message}"))?;
        self.out.flush()
    }

    pub fn goodbye(&mut self) -> io::Result<()> {
        queue!(self.out, Print("\n"))?;
        self.rule()?;
        self.line(Color::Green, "Thanks for using MCP Chat!")?;
        let ended = Local::now().format("%H:%M:%S").to_string();
        queue!(
            self.out,
            SetAttribute(Attribute::Dim),
            Print(format!("Session ended at {ended}\n")),
            SetAttribute(Attribute::Reset)
        )?;
        self.out.flush()
    }

    fn assistant_header(&mut self) -> io::Result<()> {
        if self.answering {
            return Ok(());
        }
        self.answering = true;
        queue!(self.out, Print("\n"))?;
        self.timestamp()?;
        queue!(
            self.out,
            SetForegroundColor(Color::Blue),
            SetAttribute(Attribute::Bold),
            Print(">> Assistant: "),
            SetAttribute(Attribute::Reset),
            ResetColor
        )
    }

    /// Render one event as it arrives.
    pub fn event(&mut self, event: &StreamEvent) -> io::Result<()> {
        match event {
            StreamEvent::Content { content, .. } => {
                self.assistant_header()?;
                queue!(self.out, Print(content))?;
            }
            StreamEvent::Thinking { content, .. } => {
                self.assistant_header()?;
                queue!(
                    self.out,
                    SetForegroundColor(Color::DarkGrey),
                    Print(content),
                    ResetColor
                )?;
            }
            StreamEvent::ToolCall {
                tool_name,
                tool_arguments,
                ..
            } => {
                self.answering = false;
                queue!(self.out, Print("\n"))?;
                self.timestamp()?;
                queue!(
                    self.out,
                    SetForegroundColor(Color::Magenta),
                    Print("+ Tool: "),
                    SetForegroundColor(Color::Cyan),
                    Print(tool_name),
                    ResetColor,
                    Print("\n")
                )?;
                if tool_arguments.as_object().is_some_and(|args| !args.is_empty()) {
                    let pretty = serde_json::to_string_pretty(tool_arguments)
                        .unwrap_or_else(|_| tool_arguments.to_string());
                    self.dim_block("Args:", &pretty)?;
                }
            }
            StreamEvent::ToolResult {
                tool_result,
                tool_success,
                ..
            } => {
                self.answering = false;
                queue!(self.out, Print("\n"))?;
                self.timestamp()?;
                let (icon, color) = if *tool_success {
                    ("✓", Color::Green)
                } else {
                    ("!", Color::Red)
                };
                self.line(color, &format!("{icon} Result:"))?;
                let (shown, total) = truncate_result(tool_result, self.config.max_result_length);
                self.dim_block("", &shown)?;
                if let Some(total) = total {
                    self.dim_block("", &format!("... ({total} chars total)"))?;
                }
            }
            StreamEvent::Complete { content, .. } => {
                self.answering = false;
                if let Some(error) = content {
                    self.error(error.trim_start_matches("Error: "))?;
                }
                queue!(self.out, Print("\n"))?;
            }
        }
        self.out.flush()
    }

    fn dim_block(&mut self, label: &str, body: &str) -> io::Result<()> {
        queue!(self.out, SetAttribute(Attribute::Dim))?;
        if !label.is_empty() {
            queue!(self.out, Print(format!("  {label}\n")))?;
        }
        for line in body.lines() {
            queue!(self.out, Print(format!("  {line}\n")))?;
        }
        queue!(self.out, SetAttribute(Attribute::Reset))
    }

    /// End-of-turn timing report.
    pub fn timing(&mut self, summary: &TurnSummary) -> io::Result<()> {
        queue!(self.out, Print("\n"))?;
        let lines = timing_lines(summary);
        for (i, line) in lines.iter().enumerate() {
            let color = if i == 0 || line.starts_with("Tools used") {
                Color::Green
            } else {
                Color::DarkGreen
            };
            self.line(color, line)?;
        }
        self.out.flush()
    }
}

/// Timing report lines: totals, tool count, one line per tool, then thinking time.
pub fn timing_lines(summary: &TurnSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let tool_time = summary.tool_time();
    if summary.tool_count() > 0 {
        lines.push(format!(
            "Tool time: {tool_time:.2}s | Total: {:.2}s",
            summary.total_time
        ));
        lines.push(format!("Tools used: {}", summary.tool_count()));
        for timing in &summary.tool_timings {
            lines.push(format!("   • {}: {:.2}s", timing.tool_name, timing.execution_time));
        }
    } else {
        lines.push(format!("Total: {:.2}s", summary.total_time));
    }
    if let Some(thinking) = summary.thinking_time {
        lines.push(format!("Thinking: {thinking:.2}s"));
    }
    lines
}

/// Cut `text` to `max_chars` characters. Returns the shown text and, when
/// truncated, the full character count.
pub fn truncate_result(text: &str, max_chars: usize) -> (String, Option<usize>) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), None);
    }
    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    (format!("{}...", &text[..end]), Some(total))
}
