//! Configuration loading, validation, and management for Dispatch.
//!
//! Loads configuration from `~/.dispatch/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use dispatch_core::Lane;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dispatch/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the Markdown vault
    #[serde(default = "default_vault_path")]
    pub vault_path: PathBuf,

    /// Model service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Context assembly budget
    #[serde(default)]
    pub context: ContextConfig,

    /// Conversation loop settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Standup settings
    #[serde(default)]
    pub standup: StandupConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Per-lane overrides, keyed by lane id
    #[serde(default)]
    pub lanes: HashMap<Lane, LaneConfig>,
}

fn default_vault_path() -> PathBuf {
    dirs_home().join("Dispatch")
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("vault_path", &self.vault_path)
            .field("provider", &self.provider)
            .field("context", &self.context)
            .field("conversation", &self.conversation)
            .field("standup", &self.standup)
            .field("gateway", &self.gateway)
            .field("lanes", &self.lanes)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the API base URL (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model for lane conversations and the standup synthesis
    #[serde(default = "default_model")]
    pub model: String,

    /// Faster model for the per-lane standup reports
    #[serde(default = "default_standup_model")]
    pub standup_model: String,
}

fn default_model() -> String {
    "claude-opus-4-6".into()
}
fn default_standup_model() -> String {
    "claude-sonnet-4-6".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            standup_model: default_standup_model(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("standup_model", &self.standup_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Character budget for the assembled vault context
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// How many days of daily notes count as recent
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Length of the leading excerpt for unfocused documents
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

fn default_max_chars() -> usize {
    60_000
}
fn default_lookback_days() -> u32 {
    7
}
fn default_excerpt_chars() -> usize {
    400
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            lookback_days: default_lookback_days(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Messages sent to the model per request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Messages kept per lane
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Model round-trips allowed before giving up with partial text
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Characters per streamed text event
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Pause between streamed text events
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Token limit for lane responses
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,

    /// Optional ceiling on a single model call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_timeout_secs: Option<u64>,
}

fn default_history_window() -> usize {
    8
}
fn default_history_cap() -> usize {
    dispatch_core::MAX_HISTORY
}
fn default_max_tool_iterations() -> usize {
    10
}
fn default_chunk_chars() -> usize {
    12
}
fn default_chunk_delay_ms() -> u64 {
    6
}
fn default_chat_max_tokens() -> u32 {
    2048
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            history_cap: default_history_cap(),
            max_tool_iterations: default_max_tool_iterations(),
            chunk_chars: default_chunk_chars(),
            chunk_delay_ms: default_chunk_delay_ms(),
            chat_max_tokens: default_chat_max_tokens(),
            model_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandupConfig {
    #[serde(default = "default_report_max_tokens")]
    pub report_max_tokens: u32,

    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
}

fn default_report_max_tokens() -> u32 {
    400
}
fn default_synthesis_max_tokens() -> u32 {
    4096
}

impl Default for StandupConfig {
    fn default() -> Self {
        Self {
            report_max_tokens: default_report_max_tokens(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    5151
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Per-lane overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AppConfig {
    /// Load configuration from `DISPATCH_CONFIG` or the default path
    /// (~/.dispatch/config.toml).
    ///
    /// A `.env` file in the working directory is read first. Environment
    /// variables then override the file:
    /// - `VAULT_PATH`
    /// - `ANTHROPIC_API_KEY`
    /// - `DISPATCH_MODEL`, `DISPATCH_STANDUP_MODEL`
    /// - `DISPATCH_HOST`, `DISPATCH_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DISPATCH_CONFIG").ok().map(PathBuf::from);
        Self::load_with(path.as_deref())
    }

    /// Like [`AppConfig::load`], with an explicit config file path
    /// (`dispatch --config`). `None` means the default path.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = var("VAULT_PATH") {
            self.vault_path = PathBuf::from(path);
        }
        if let Some(key) = var("ANTHROPIC_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = var("DISPATCH_MODEL") {
            self.provider.model = model;
        }
        if let Some(model) = var("DISPATCH_STANDUP_MODEL") {
            self.provider.standup_model = model;
        }
        if let Some(host) = var("DISPATCH_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = var("DISPATCH_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("DISPATCH_PORT is not a port number: {port}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dispatch")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.model.trim().is_empty() || self.provider.standup_model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model names must not be empty".into()));
        }

        let conv = &self.conversation;
        if conv.history_window == 0 || conv.history_cap == 0 {
            return Err(ConfigError::ValidationError(
                "history_window and history_cap must be > 0".into(),
            ));
        }
        if conv.history_cap > dispatch_core::MAX_HISTORY {
            return Err(ConfigError::ValidationError(format!(
                "history_cap must be <= {}",
                dispatch_core::MAX_HISTORY
            )));
        }
        if conv.chunk_chars == 0 || conv.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_chars and max_tool_iterations must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// The system prompt override for a lane, if configured.
    pub fn lane_prompt(&self, lane: Lane) -> Option<&str> {
        self.lanes.get(&lane).and_then(|l| l.system_prompt.as_deref())
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            provider: ProviderConfig::default(),
            context: ContextConfig::default(),
            conversation: ConversationConfig::default(),
            standup: StandupConfig::default(),
            gateway: GatewayConfig::default(),
            lanes: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
