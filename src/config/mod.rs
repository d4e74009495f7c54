//! Configuration system (layered: defaults < config file < env).
//!
//! A [`ChatConfig`] is a plain value. It is built once at startup and passed
//! into each component's constructor; nothing reads it from ambient state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::types::GenerationSettings;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MCP_URL: &str = "http://127.0.0.1:8000/mcp";
const DEFAULT_SYSTEM_MESSAGE: &str = "You have been given access to a MCP (model context protocol) server, \
by this access you have gained access to a few tools and resources.";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variables consulted by [`ChatConfig::apply_env`], highest priority first
/// within each setting.
pub const ENV_VARS: [&str; 7] = [
    "MCP_CHAT_API_KEY",
    "OPENAI_API_KEY",
    "MCP_CHAT_BASE_URL",
    "OPENAI_BASE_URL",
    "MCP_CHAT_MODEL",
    "MCP_CHAT_MCP_URL",
    "MCP_CHAT_SYSTEM_MESSAGE",
];

/// Complete process configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub model: ModelConfig,
    pub mcp: McpConfig,
    pub generation: GenerationSettings,
    pub chat: ChatSettings,
    pub ui: UiConfig,
    pub server: ServerConfig,
}

/// Model endpoint settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "Qwen/Qwen3-32B-fast".to_string(),
        }
    }
}

/// MCP server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl McpConfig {
    /// Bound on the handshake and on each MCP request.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MCP_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatSettings {
    pub system_message: String,
    /// Upper bound on model/tool rounds per turn. Unbounded when absent.
    pub max_rounds: Option<usize>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            max_rounds: None,
        }
    }
}

/// Terminal presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub max_result_length: usize,
    pub clear_screen_on_start: bool,
    pub show_timestamps: bool,
    pub exit_commands: Vec<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            max_result_length: 500,
            clear_screen_on_start: true,
            show_timestamps: true,
            exit_commands: ["quit", "exit", "bye", "q"].map(String::from).to_vec(),
        }
    }
}

impl UiConfig {
    /// Whether `input` is one of the configured exit commands (case-insensitive).
    pub fn is_exit_command(&self, input: &str) -> bool {
        let input = input.trim().to_lowercase();
        self.exit_commands.iter().any(|c| c.to_lowercase() == input)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

impl ChatConfig {
    /// Load configuration: defaults, then the TOML file (explicit path or the
    /// per-user default location if it exists), then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config file");
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse TOML text. Missing sections and keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ChatError::Configuration(e.to_string()))
    }

    /// Per-user config file location (`<config_dir>/mcp-chat/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "mcp-chat")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).filter(|v| !v.is_empty()));

        if let Some(key) = first(&["MCP_CHAT_API_KEY", "OPENAI_API_KEY"]) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = first(&["MCP_CHAT_BASE_URL", "OPENAI_BASE_URL"]) {
            self.model.base_url = url;
        }
        if let Some(model) = first(&["MCP_CHAT_MODEL"]) {
            self.model.model = model;
        }
        if let Some(url) = first(&["MCP_CHAT_MCP_URL"]) {
            self.mcp.url = url;
        }
        if let Some(message) = first(&["MCP_CHAT_SYSTEM_MESSAGE"]) {
            self.chat.system_message = message;
        }
    }

    /// Reject configurations that cannot reach a model.
    pub fn validate(&self) -> Result<()> {
        if self.model.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ChatError::Configuration(
                "Missing API key (set MCP_CHAT_API_KEY or OPENAI_API_KEY)".into(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(ChatError::Configuration("Model name is empty".into()));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(ChatError::Configuration("Model base URL is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_client() {
        let config = ChatConfig::default();
        assert_eq!(config.mcp.url, "http://127.0.0.1:8000/mcp");
        assert_eq!(config.mcp.timeout_secs, 30);
        assert_eq!(config.generation.max_tokens, Some(8192));
        assert_eq!(config.generation.top_k, Some(20));
        assert_eq!(config.ui.max_result_length, 500);
        assert_eq!(config.server.port, 8001);
        assert!(config.chat.max_rounds.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ChatConfig::from_toml_str(
            r#"
            [model]
            model = "gpt-4o-mini"

            [generation]
            temperature = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(config.model.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.generation.temperature, Some(0.1));
        assert_eq!(config.mcp, McpConfig::default());
    }

    #[test]
    fn malformed_toml_is_configuration_error() {
        let err = ChatConfig::from_toml_str("[model\nmodel=").unwrap_err();
        assert!(matches!(err, ChatError::Configuration(_)));
    }

    #[test]
    fn specific_env_var_wins_over_generic() {
        let mut config = ChatConfig::default();
        config.apply_env_from(lookup(&[
            ("OPENAI_API_KEY", "generic"),
            ("MCP_CHAT_API_KEY", "specific"),
            ("OPENAI_BASE_URL", "http://localhost:1234/v1"),
        ]));
        assert_eq!(config.model.api_key.as_deref(), Some("specific"));
        assert_eq!(config.model.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = ChatConfig::default();
        config.apply_env_from(lookup(&[("MCP_CHAT_MODEL", "")]));
        assert_eq!(config.model.model, ModelConfig::default().model);
    }

    #[test]
    fn validate_requires_api_key() {
        let mut config = ChatConfig::default();
        assert!(matches!(config.validate(), Err(ChatError::Configuration(_))));
        config.model.api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn exit_commands_match_case_insensitively() {
        let ui = UiConfig::default();
        assert!(ui.is_exit_command("QUIT"));
        assert!(ui.is_exit_command(" bye "));
        assert!(!ui.is_exit_command("hello"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let mut config = ChatConfig::default();
        config.model.api_key = Some("sk-secret".into());
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
