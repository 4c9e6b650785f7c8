//! Bootstrap configuration loading and config file resolution
//!
//! Configuration sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML config file
//! 4. Built-in defaults (code constants)
//!
//! This module owns tiers 3 and 4. Binaries layer their CLI/ENV values on top.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LDASH_CONFIG";

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a built-in default so an empty (or missing) file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Base URL of the remote ingestion service
    pub server_url: String,

    /// Status polling period while a parsing job runs
    pub poll_interval_ms: u64,

    /// Upper bound on the remote cancellation request
    pub cancel_timeout_ms: u64,

    /// Consecutive failed status polls tolerated before the job is abandoned.
    /// `0` keeps polling forever.
    pub max_consecutive_poll_failures: u32,

    /// Port for the local `/events` SSE surface (disabled when absent)
    pub events_port: Option<u16>,

    /// ETA estimator tuning
    pub eta: EtaSettings,

    /// Remote endpoint paths, relative to `server_url`
    pub endpoints: EndpointPaths,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Average observed stage durations used as allowances for stages not yet started
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EtaSettings {
    pub counting_lines_secs: f64,
    pub parsing_secs: f64,
    pub finalization_secs: f64,
    pub indexing_secs: f64,
    pub statistics_secs: f64,
    /// Sanity ceiling applied to every estimate
    pub ceiling_secs: f64,
}

/// Remote endpoint paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointPaths {
    pub start_parsing: String,
    pub parsing_status: String,
    pub cancel_parsing: String,
    pub check_file: String,
    pub check_data: String,
    pub logs: String,
    pub top_urls: String,
    pub top_users: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or full EnvFilter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            poll_interval_ms: 2000,
            cancel_timeout_ms: 5000,
            max_consecutive_poll_failures: 15,
            events_port: None,
            eta: EtaSettings::default(),
            endpoints: EndpointPaths::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EtaSettings {
    fn default() -> Self {
        Self {
            counting_lines_secs: 5.0,
            parsing_secs: 386.5,
            finalization_secs: 450.0,
            indexing_secs: 220.0,
            statistics_secs: 170.0,
            ceiling_secs: 24.0 * 60.0 * 60.0,
        }
    }
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            start_parsing: "/api/start-file-parsing".to_string(),
            parsing_status: "/api/parsing-status".to_string(),
            cancel_parsing: "/api/cancel-parsing".to_string(),
            check_file: "/api/check-file".to_string(),
            check_data: "/api/check-data".to_string(),
            logs: "/api/logs".to_string(),
            top_urls: "/api/top-urls".to_string(),
            top_users: "/api/top-users".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Check values that would make the client misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::Config("server_url must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be greater than zero".to_string()));
        }
        if self.cancel_timeout_ms == 0 {
            return Err(Error::Config("cancel_timeout_ms must be greater than zero".to_string()));
        }
        if self.eta.ceiling_secs.is_nan() || self.eta.ceiling_secs <= 0.0 {
            return Err(Error::Config("eta.ceiling_secs must be positive".to_string()));
        }
        for (name, secs) in self.eta.allowances() {
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::Config(format!(
                    "eta.{} must be a non-negative number of seconds, got {}",
                    name, secs
                )));
            }
        }
        Ok(())
    }
}

impl EtaSettings {
    /// Per-stage allowances keyed by their config names
    pub fn allowances(&self) -> [(&'static str, f64); 5] {
        [
            ("counting_lines_secs", self.counting_lines_secs),
            ("parsing_secs", self.parsing_secs),
            ("finalization_secs", self.finalization_secs),
            ("indexing_secs", self.indexing_secs),
            ("statistics_secs", self.statistics_secs),
        ]
    }
}

/// Config file resolution:
/// 1. Explicit path (command line)
/// 2. `LDASH_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/ldash/<file_name>`), if it exists
pub fn resolve_config_path(cli_arg: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform default location
    let default_path = dirs::config_dir().map(|d| d.join("ldash").join(file_name))?;
    if default_path.exists() {
        Some(default_path)
    } else {
        debug!("No config file at {}", default_path.display());
        None
    }
}

/// Load TOML configuration from `path`
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Load configuration from the resolved path, or built-in defaults if none exists
///
/// An explicitly named file that is missing is an error; a missing default file is not.
pub fn load_or_default(cli_arg: Option<&Path>, file_name: &str) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg, file_name) {
        Some(path) => load_toml_config(&path),
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
