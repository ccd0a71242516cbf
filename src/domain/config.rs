//! # Configuration
//!
//! Manages the loading and parsing of the configuration file (`config.yaml`).
//! Every section and field has a default, so an empty document is a valid config.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::types::ExecutionMode;

/// Main configuration structure.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and parse a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Invalid configuration")
    }

    /// `<config dir>/artisan/config.yaml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("artisan").join("config.yaml"))
    }
}

/// The retry budget lives in `recovery`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecoveryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_true")]
    pub enable_web_search: bool,
    #[serde(default = "default_true")]
    pub enable_git_rollback: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            enable_web_search: true,
            enable_git_rollback: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandsConfig {
    /// Case-insensitive prefixes of commands that are never run.
    #[serde(default = "default_blocked_prefixes")]
    pub blocked_prefixes: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            blocked_prefixes: default_blocked_prefixes(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
        }
    }
}

impl CommandsConfig {
    /// Effective timeout for a command, clamped to `max_timeout_ms`.
    pub fn timeout_for(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.default_timeout_ms)
            .clamp(1, self.max_timeout_ms.max(1));
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    /// Name of the outer response tag, e.g. `response` for `<response>...</response>`.
    #[serde(default = "default_envelope")]
    pub envelope: String,
    /// Minimum interval between UI updates while streaming.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            envelope: default_envelope(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    /// Number of results rendered into a `web_search` output.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    #[serde(default)]
    pub root_dir: Option<String>,
    #[serde(default = "default_terminal_history")]
    pub terminal_history: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            terminal_history: default_terminal_history(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the log file; console only when unset.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_name: default_log_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_blocked_prefixes() -> Vec<String> {
    ["npm", "yarn", "pnpm", "npx create-", "npx init"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_timeout_ms() -> u64 {
    600_000
}

fn default_envelope() -> String {
    "response".to_string()
}

fn default_throttle_ms() -> u64 {
    50
}

fn default_search_endpoint() -> String {
    "http://localhost:3000/api/search".to_string()
}

fn default_search_timeout() -> u64 {
    15
}

fn default_max_results() -> usize {
    5
}

fn default_terminal_history() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "artisan.log".to_string()
}
