//! Application configuration
//!
//! ## Resolution
//!
//! 1. Embedded defaults (`config/subtrak.toml`, compiled into the binary)
//! 2. User file: `--config <path>` if given, else `~/.config/subtrak/config.toml`
//!    when it exists. Keys present in the file replace the defaults.
//! 3. Environment: `SUBTRAK_AGGREGATOR_ENV`, `CODEF_CLIENT_ID`, `CODEF_CLIENT_SECRET`
//!
//! Credentials only ever come from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::aggregator::AggregatorEnvironment;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/subtrak.toml");

pub const CLIENT_ID_ENV: &str = "CODEF_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "CODEF_CLIENT_SECRET";
pub const AGGREGATOR_ENV_ENV: &str = "SUBTRAK_AGGREGATOR_ENV";

/// Aggregator connection settings
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub environment: AggregatorEnvironment,
    /// Overrides the environment's base URL when set
    pub base_url: Option<String>,
    pub token_url: String,
    pub timeout: Duration,
    pub default_months_back: u32,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            environment: AggregatorEnvironment::Sandbox,
            base_url: None,
            token_url: crate::aggregator::DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(30),
            default_months_back: 6,
            client_id: None,
            client_secret: None,
        }
    }
}

impl AggregatorConfig {
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.client_id, &self.client_secret),
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty()
        )
    }
}

/// Windows used by the maintenance pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub upcoming_days: i64,
    pub card_expiry_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            upcoming_days: 3,
            card_expiry_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardConfig {
    pub upcoming_days: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { upcoming_days: 30 }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub maintenance: MaintenanceConfig,
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Load defaults, the user file and the process environment
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_toml(DEFAULT_CONFIG)?;

        let user_path = match override_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => default_config_path().filter(|p| p.exists()),
        };

        if let Some(path) = user_path {
            debug!("Loading config from {}", path.display());
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
            config.merge_toml(&content)?;
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a complete config from TOML, starting from built-in defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge_toml(content)?;
        Ok(config)
    }

    /// Overlay the keys present in `content`
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        if let Some(aggregator) = raw.aggregator {
            if let Some(env) = aggregator.environment {
                self.aggregator.environment = env.parse().map_err(Error::Config)?;
            }
            if let Some(base_url) = aggregator.base_url {
                self.aggregator.base_url = Some(base_url);
            }
            if let Some(token_url) = aggregator.token_url {
                self.aggregator.token_url = token_url;
            }
            if let Some(timeout) = aggregator.timeout_secs {
                self.aggregator.timeout = Duration::from_secs(timeout);
            }
            if let Some(months) = aggregator.default_months_back {
                if months == 0 {
                    return Err(Error::Config(
                        "aggregator.default_months_back must be at least 1".into(),
                    ));
                }
                self.aggregator.default_months_back = months;
            }
        }

        if let Some(maintenance) = raw.maintenance {
            if let Some(days) = maintenance.upcoming_days {
                self.maintenance.upcoming_days = days;
            }
            if let Some(days) = maintenance.card_expiry_days {
                self.maintenance.card_expiry_days = days;
            }
        }

        if let Some(dashboard) = raw.dashboard {
            if let Some(days) = dashboard.upcoming_days {
                self.dashboard.upcoming_days = days;
            }
        }

        Ok(())
    }

    /// Overlay environment variables, read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup(AGGREGATOR_ENV_ENV) {
            self.aggregator.environment = env.parse().map_err(Error::Config)?;
        }
        if let Some(id) = lookup(CLIENT_ID_ENV) {
            self.aggregator.client_id = Some(id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV) {
            self.aggregator.client_secret = Some(secret);
        }
        Ok(())
    }
}

/// Default user config path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("subtrak").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    aggregator: Option<RawAggregator>,
    maintenance: Option<RawMaintenance>,
    dashboard: Option<RawDashboard>,
}

#[derive(Debug, Deserialize)]
struct RawAggregator {
    environment: Option<String>,
    base_url: Option<String>,
    token_url: Option<String>,
    timeout_secs: Option<u64>,
    default_months_back: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawMaintenance {
    upcoming_days: Option<i64>,
    card_expiry_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawDashboard {
    upcoming_days: Option<i64>,
}
