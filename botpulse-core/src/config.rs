//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/botpulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/botpulse/` (~/.config/botpulse/)
//! - State/Logs: `$XDG_STATE_HOME/botpulse/` (~/.local/state/botpulse/)
//!
//! The API base URL can also be supplied through `BOTPULSE_API_URL`, which
//! wins over the file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "BOTPULSE_API_URL";

/// Base URL used when neither the file nor the environment set one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Analytics API client configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analytics API client configuration
///
/// Every knob of the fetch-retry-poll loop lives here; nothing is read
/// from process-wide state after startup.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the analytics API (e.g., `http://localhost:5000/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Retries allowed after the first failed attempt of a chain. This
    /// counts retries, not attempts: up to `max_attempts + 1` requests.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Period of the background refresh in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_timeout_secs() -> u64 {
    10
}

impl ApiConfig {
    /// Base URL without trailing slashes, ready for joining endpoint paths
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Delay between two attempts of one retry chain
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Period of the recurring refresh
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let base_url = self.normalized_base_url();
        if base_url.is_empty() {
            return Err(Error::Config("api.base_url must not be empty".to_string()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api.base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "api.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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
    /// Load configuration from the default path, then apply the environment
    pub fn load() -> Result<Self> {
        Self::load_with_override(None)
    }

    /// Like [`load`](Self::load), with `base_url` (e.g. a `--url` flag)
    /// taking precedence over both the file and the environment.
    ///
    /// Validation runs once, after every override has been applied.
    pub fn load_with_override(base_url: Option<String>) -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_override(std::env::var(API_URL_ENV).ok());
        config.apply_url_override(base_url);
        config.api.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Replace the base URL with an environment-provided one, if non-empty
    pub fn apply_env_override(&mut self, base_url: Option<String>) {
        self.override_base_url(base_url, API_URL_ENV);
    }

    /// Replace the base URL with an explicitly requested one, if non-empty
    pub fn apply_url_override(&mut self, base_url: Option<String>) {
        self.override_base_url(base_url, "--url");
    }

    fn override_base_url(&mut self, base_url: Option<String>, source: &str) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!(url = %url, source, "Overriding API base URL");
            self.api.base_url = url.trim().to_string();
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/botpulse/config.toml` (~/.config/botpulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("botpulse").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/botpulse/` (~/.local/state/botpulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("botpulse")
    }
}
