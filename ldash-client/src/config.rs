//! Resolved client configuration
//!
//! Layers command-line and environment values (both collected by clap) over the TOML file
//! and built-in defaults from `ldash_common::config`.

use crate::dashboard::DashboardSettings;
use crate::error::{ClientError, ClientResult};
use crate::polling::PollingSettings;
use crate::remote::{TOP_URLS_LIMIT, TOP_USERS_LIMIT};
use ldash_common::config::{load_or_default, EndpointPaths, EtaSettings, TomlConfig};
use std::path::Path;
use std::time::Duration;

/// Default config file name under `<config_dir>/ldash/`
pub const CONFIG_FILE_NAME: &str = "ldash-client.toml";

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub events_port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub poll_interval: Duration,
    pub cancel_timeout: Duration,
    pub max_consecutive_poll_failures: u32,
    pub events_port: Option<u16>,
    pub eta: EtaSettings,
    pub endpoints: EndpointPaths,
    pub log_level: String,
}

impl ClientConfig {
    /// Resolve from the config file (explicit, `LDASH_CONFIG` or default location) plus overrides
    pub fn load(config_path: Option<&Path>, overrides: &ConfigOverrides) -> ClientResult<Self> {
        let toml = load_or_default(config_path, CONFIG_FILE_NAME)?;
        Self::from_toml(toml).with_overrides(overrides)
    }

    pub fn from_toml(toml: TomlConfig) -> Self {
        Self {
            server_url: toml.server_url,
            poll_interval: Duration::from_millis(toml.poll_interval_ms),
            cancel_timeout: Duration::from_millis(toml.cancel_timeout_ms),
            max_consecutive_poll_failures: toml.max_consecutive_poll_failures,
            events_port: toml.events_port,
            eta: toml.eta,
            endpoints: toml.endpoints,
            log_level: toml.logging.level,
        }
    }

    /// Apply higher-priority values, then re-validate
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> ClientResult<Self> {
        if let Some(url) = &overrides.server_url {
            self.server_url = url.clone();
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(port) = overrides.events_port {
            self.events_port = Some(port);
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }

        if self.server_url.trim().is_empty() {
            return Err(ClientError::Config("server URL must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn polling_settings(&self) -> PollingSettings {
        PollingSettings {
            interval: self.poll_interval,
            max_consecutive_failures: self.max_consecutive_poll_failures,
        }
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            cancel_timeout: self.cancel_timeout,
            top_urls_limit: TOP_URLS_LIMIT,
            top_users_limit: TOP_USERS_LIMIT,
            reload_after_parsing: true,
        }
    }
}
