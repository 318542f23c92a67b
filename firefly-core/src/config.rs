//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/firefly/config.toml`, or built
//! programmatically by the embedding application.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/firefly/` (~/.config/firefly/)
//! - Data: `$XDG_DATA_HOME/firefly/` (~/.local/share/firefly/)
//! - State/Logs: `$XDG_STATE_HOME/firefly/` (~/.local/state/firefly/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
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
    /// Delivery pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Delivery pipeline configuration
///
/// `endpoint_url` is the only required field; everything else has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Collector endpoint URL (e.g., `https://telemetry.example.com/events`)
    pub endpoint_url: Option<String>,

    /// Optional bearer token sent with every delivery request
    pub api_key: Option<String>,

    /// Queue length that forces an immediate flush
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Max milliseconds before an armed flush timer fires
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,

    /// Max stored batch records retained in the durable log
    #[serde(default = "default_store_cap")]
    pub store_cap: usize,

    /// Hard cap on queued events; oldest dropped past this
    #[serde(default = "default_queue_cap")]
    pub queue_cap: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Override path for the durable batch log
    pub store_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            api_key: None,
            batch_limit: default_batch_limit(),
            time_limit_ms: default_time_limit_ms(),
            store_cap: default_store_cap(),
            queue_cap: default_queue_cap(),
            timeout_secs: default_timeout_secs(),
            store_path: None,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let url = self
            .endpoint_url
            .as_deref()
            .ok_or_else(|| Error::Config("pipeline.endpoint_url is required".to_string()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Config(format!(
                "pipeline.endpoint_url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if self.batch_limit == 0 {
            return Err(Error::Config(
                "pipeline.batch_limit must be at least 1".to_string(),
            ));
        }
        if self.time_limit_ms == 0 {
            return Err(Error::Config(
                "pipeline.time_limit_ms must be at least 1".to_string(),
            ));
        }
        if self.store_cap == 0 {
            return Err(Error::Config(
                "pipeline.store_cap must be at least 1".to_string(),
            ));
        }
        if self.queue_cap < self.batch_limit {
            return Err(Error::Config(
                "pipeline.queue_cap must be >= pipeline.batch_limit".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved path of the durable batch log
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("pending-batches.json"))
    }
}

fn default_batch_limit() -> usize {
    10
}

fn default_time_limit_ms() -> u64 {
    5000
}

fn default_store_cap() -> usize {
    50
}

fn default_queue_cap() -> usize {
    1000
}

fn default_timeout_secs() -> u64 {
    30
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
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/firefly/config.toml` (~/.config/firefly/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("firefly").join("config.toml")
    }

    /// Returns the data directory path (for the durable batch log)
    ///
    /// `$XDG_DATA_HOME/firefly/` (~/.local/share/firefly/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("firefly")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/firefly/` (~/.local/state/firefly/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("firefly")
    }
}
