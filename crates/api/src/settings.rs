//! Application settings
//!
//! Loaded from an optional `drowsiness.toml` (or an explicit path) and
//! `DROWSY__*` environment variables, e.g. `DROWSY__SERVER__ADDR=0.0.0.0:9000`
//! or `DROWSY__DMS__DECISION__RULE_SET=threshold_only`.

use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
    pub log_level: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            metrics: true,
        }
    }
}

/// All runtime settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub rate_limit: RateLimitConfig,
    pub alerts: AlertConfig,
    pub dms: DmsConfig,
}

impl Settings {
    /// Load settings; an explicit path must exist, the default file is optional
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path.unwrap_or("drowsiness")).required(path.is_some()))
            .add_source(Environment::with_prefix("DROWSY").separator("__"))
            .build()?
            .try_deserialize()
    }
}
