//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tally/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tally/` (~/.config/tally/)
//! - State/Logs: `$XDG_STATE_HOME/tally/` (~/.local/state/tally/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracker behavior
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Which consumer delivers events, and where
    #[serde(default)]
    pub consumer: ConsumerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracker configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TrackerConfig {
    /// Turn delivery failures into errors. For integration testing only.
    #[serde(default)]
    pub strict: bool,

    /// Registered as the `$app_version` super property
    pub app_version: Option<String>,
}

/// Consumer variants
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerKind {
    /// Send every event as its own request
    Immediate,
    /// Buffer events and send them in batches
    #[default]
    Batch,
    /// Append events to a local file, one per line
    File,
}

/// Consumer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub kind: ConsumerKind,

    /// Collector URL (e.g., `https://collector.example.com/sa`)
    pub server_url: Option<String>,

    /// Events per request for the batch consumer (max 1000, default 50)
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Connect and read timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retry attempts for transient failures within one delivery
    #[serde(default)]
    pub max_retries: usize,

    /// Output file for the file consumer
    pub file_path: Option<PathBuf>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            kind: ConsumerKind::default(),
            server_url: None,
            max_size: default_max_size(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: 0,
            file_path: None,
        }
    }
}

fn default_max_size() -> usize {
    50
}

fn default_request_timeout_ms() -> u64 {
    1000
}

impl ConsumerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            ConsumerKind::Immediate | ConsumerKind::Batch if self.server_url.is_none() => {
                return Err(Error::Config(
                    "consumer.server_url is required for immediate and batch consumers"
                        .to_string(),
                ));
            }
            ConsumerKind::File if self.file_path.is_none() => {
                return Err(Error::Config(
                    "consumer.file_path is required for the file consumer".to_string(),
                ));
            }
            _ => {}
        }
        if self.max_size == 0 || self.max_size > 1000 {
            return Err(Error::Config(
                "consumer.max_size must be between 1 and 1000".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                "consumer.request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tally/config.toml` (~/.config/tally/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tally").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tally/` (~/.local/state/tally/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tally")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/tally/tally.log` (~/.local/state/tally/tally.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tally.log")
    }
}
