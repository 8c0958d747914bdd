//! Configuration management for the screener.
//!
//! The screener reads a single JSON file at `~/.tpex-screener/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (TPEX_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TPEX_LOG_LEVEL` → observability.log_level
//! - `TPEX_LOG_FORMAT` → observability.log_format
//! - `TPEX_BASE_URL` → data_source.tpex_base_url
//! - `TPEX_TIMEOUT_SECS` → data_source.timeout_secs
//! - `TPEX_CONCURRENCY` → screener.concurrency
//! - `TPEX_OUTPUT_DIR` → output.dir

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".tpex-screener"),
        |dirs| dirs.home_dir().join(".tpex-screener"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Upstream data source endpoints and HTTP behaviour
    #[serde(default)]
    pub data_source: DataSourceConfig,

    /// Screening run settings
    #[serde(default)]
    pub screener: ScreenerSettings,

    /// Result table output
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparsable numeric values are ignored and logged.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("TPEX_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("TPEX_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(url) = lookup("TPEX_BASE_URL") {
            self.data_source.tpex_base_url = url;
        }
        if let Some(secs) = lookup("TPEX_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(v) => self.data_source.timeout_secs = v,
                Err(_) => tracing::warn!(value = %secs, "Ignoring invalid TPEX_TIMEOUT_SECS"),
            }
        }
        if let Some(n) = lookup("TPEX_CONCURRENCY") {
            match n.parse() {
                Ok(v) => self.screener.concurrency = v,
                Err(_) => tracing::warn!(value = %n, "Ignoring invalid TPEX_CONCURRENCY"),
            }
        }
        if let Some(dir) = lookup("TPEX_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
    }

    /// Check values that would make a run impossible.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.screener.concurrency == 0 {
            return Err(crate::error::Error::Config(
                "screener.concurrency must be at least 1".into(),
            ));
        }
        if self.data_source.timeout_secs == 0 {
            return Err(crate::error::Error::Config(
                "data_source.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Data Source
// ============================================================================

/// Upstream endpoints for the roster, history and industry lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Base URL of the exchange site serving roster and monthly history
    #[serde(default = "default_tpex_base_url")]
    pub tpex_base_url: String,

    /// Base URL of the industry value chain site
    #[serde(default = "default_industry_base_url")]
    pub industry_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            tpex_base_url: default_tpex_base_url(),
            industry_base_url: default_industry_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_tpex_base_url() -> String {
    "https://www.tpex.org.tw".into()
}

fn default_industry_base_url() -> String {
    "https://ic.tpex.org.tw".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}

// ============================================================================
// Screener
// ============================================================================

/// Screening run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerSettings {
    /// Maximum number of instruments processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ScreenerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    20
}

// ============================================================================
// Output
// ============================================================================

/// Where result tables are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for the CSV result tables
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    config_dir().join("output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
        assert_eq!(config.data_source.timeout_secs, 10);
        assert_eq!(config.data_source.user_agent, "Mozilla/5.0");
        assert_eq!(config.screener.concurrency, 20);
        assert!(config.output.dir.ends_with("output"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "screener": { "concurrency": 4 }, "observability": { "level": "debug" } }"#,
        )
        .unwrap();
        assert_eq!(config.screener.concurrency, 4);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.data_source.tpex_base_url, "https://www.tpex.org.tw");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "output": {{ "dir": "/tmp/tpex-out" }} }}"#).unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("/tmp/tpex-out"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TPEX_LOG_LEVEL", "debug"),
            ("TPEX_CONCURRENCY", "8"),
            ("TPEX_TIMEOUT_SECS", "not-a-number"),
            ("TPEX_OUTPUT_DIR", "/data/out"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.screener.concurrency, 8);
        assert_eq!(config.data_source.timeout_secs, 10);
        assert_eq!(config.output.dir, PathBuf::from("/data/out"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.screener.concurrency = 0;
        assert!(config.validate().unwrap_err().is_config());
    }
}
