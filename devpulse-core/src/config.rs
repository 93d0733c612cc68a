//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/devpulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/devpulse/` (~/.config/devpulse/)
//! - Data: `$XDG_DATA_HOME/devpulse/` (~/.local/share/devpulse/)
//! - State/Logs: `$XDG_STATE_HOME/devpulse/` (~/.local/state/devpulse/)

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
    /// GitHub API access
    #[serde(default)]
    pub github: GithubConfig,

    /// Metrics defaults
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    /// API base URL; point at a GitHub Enterprise host if needed
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Personal access token (the GITHUB_TOKEN env var wins)
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
        }
    }
}

impl GithubConfig {
    /// Resolved token: environment first, then config file.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.token.clone())
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Metrics defaults
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// Window length for the KPI overview, in days
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,

    /// Lookback for the commit heatmap, in weeks
    #[serde(default = "default_heatmap_weeks")]
    pub heatmap_weeks: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
            heatmap_weeks: default_heatmap_weeks(),
        }
    }
}

fn default_window_days() -> i64 {
    30
}

fn default_heatmap_weeks() -> i64 {
    12
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    7
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
    /// `$XDG_CONFIG_HOME/devpulse/config.toml` (~/.config/devpulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("devpulse").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/devpulse/` (~/.local/share/devpulse/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("devpulse")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/devpulse/` (~/.local/state/devpulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("devpulse")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/devpulse/devpulse.db` (~/.local/share/devpulse/devpulse.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("devpulse.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/devpulse/devpulse.log` (~/.local/state/devpulse/devpulse.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("devpulse.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.github.token.is_none());
        assert_eq!(config.metrics.default_window_days, 30);
        assert_eq!(config.metrics.heatmap_weeks, 12);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 7);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[github]
api_url = "https://github.example.com/api/v3"
token = "ghp_testtoken"

[metrics]
default_window_days = 14

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.github.api_url, "https://github.example.com/api/v3");
        assert_eq!(config.github.token.as_deref(), Some("ghp_testtoken"));
        assert_eq!(config.metrics.default_window_days, 14);
        // Unset fields fall back to defaults
        assert_eq!(config.metrics.heatmap_weeks, 12);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: Config = toml::from_str("[metrics]\nheatmap_weeks = 4\n").unwrap();
        assert_eq!(config.metrics.heatmap_weeks, 4);
        assert_eq!(config.metrics.default_window_days, 30);
        assert_eq!(config.github.api_url, "https://api.github.com");
    }
}
