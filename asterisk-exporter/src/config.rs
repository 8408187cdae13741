//! Configuration for the Asterisk exporter.

use asterisk_common::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// How to reach the Asterisk CLI.
    #[serde(default)]
    pub asterisk: AsteriskConfig,

    /// Prometheus endpoint settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Which collectors are registered.
    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Asterisk CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsteriskConfig {
    /// Path of the `asterisk` binary (default: "asterisk").
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Maximum run time of a single CLI command (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_binary() -> String {
    "asterisk".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl AsteriskConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AsteriskConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9200").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric name prefix (default: "asterisk").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:9200".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "asterisk".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            prefix: default_prefix(),
        }
    }
}

/// Collector toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// `sip show ...` metrics (default: true).
    #[serde(default = "default_enabled")]
    pub sip: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            sip: default_enabled(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asterisk.binary.trim().is_empty() {
            return Err(ConfigError::Validation(
                "asterisk binary must not be empty".to_string(),
            ));
        }

        if self.asterisk.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if !self.collectors.sip {
            return Err(ConfigError::Validation(
                "At least one collector must be enabled".to_string(),
            ));
        }

        Ok(())
    }
}
