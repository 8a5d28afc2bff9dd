pub mod serde_helpers;
mod validation;

use crate::domain::Level;
pub use crate::logging::LogLevel;
use crate::reliability::CircuitConfig;
use crate::sender::{ClientConfig, WireFormat};
use crate::sink::SinkOptions;
use crate::switch::{MatchMode, PollerOptions, SwitchDef};
use serde::{Deserialize, Serialize};
use serde_helpers::{load_env_enum, load_env_millis, load_env_string, load_env_var};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

/// Where assembled batches go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// `POST {base_url}/api/sink`
    #[default]
    Http,
    /// One line per event on stdout
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Collector root; both `api/sink` and `api/switches` hang off it.
    pub base_url: String,
    pub domain: String,

    pub batch_size: usize,
    #[serde(with = "serde_helpers")]
    pub flush_interval: Duration,
    #[serde(with = "serde_helpers")]
    pub poll_interval: Duration,
    pub polling_enabled: bool,

    pub failure_threshold: u32,
    #[serde(with = "serde_helpers")]
    pub base_retry_delay: Duration,
    #[serde(with = "serde_helpers")]
    pub max_retry_delay: Duration,
    pub max_critical_buffer_size: usize,
    #[serde(with = "serde_helpers")]
    pub shutdown_grace_period: Duration,

    #[serde(with = "serde_helpers")]
    pub request_timeout: Duration,
    #[serde(with = "serde_helpers")]
    pub connection_timeout: Duration,
    pub max_connections: usize,

    pub wire_format: WireFormat,
    pub destination: Destination,
    pub match_mode: MatchMode,
    /// Level of the fallback switch used when no pattern matches.
    pub default_level: Level,
    /// Verbosity of this crate's own diagnostics.
    pub log_level: LogLevel,
    /// When false the switches below are the only source of truth.
    pub remote_switches: bool,
    pub switches: Vec<SwitchDef>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            domain: "default".to_string(),
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
            poll_interval: Duration::from_secs(30),
            polling_enabled: true,
            failure_threshold: 3,
            base_retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(120),
            max_critical_buffer_size: 1000,
            shutdown_grace_period: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            max_connections: 10,
            wire_format: WireFormat::default(),
            destination: Destination::default(),
            match_mode: MatchMode::default(),
            default_level: Level::default(),
            log_level: LogLevel::default(),
            remote_switches: true,
            switches: Vec::new(),
        }
    }
}

impl WatchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Starts from `WATCH_CONFIG` (inline TOML) when present, otherwise from
    /// defaults, then applies individual `WATCH_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("WATCH_CONFIG") {
            Ok(content) => toml::from_str(&content)?,
            Err(_) => WatchConfig::default(),
        };

        load_env_string("WATCH_BASE_URL", &mut config.base_url);
        load_env_string("WATCH_DOMAIN", &mut config.domain);
        load_env_var("WATCH_BATCH_SIZE", &mut config.batch_size)?;
        load_env_millis("WATCH_FLUSH_INTERVAL_MS", &mut config.flush_interval)?;
        load_env_millis("WATCH_POLL_INTERVAL_MS", &mut config.poll_interval)?;
        load_env_var("WATCH_POLLING_ENABLED", &mut config.polling_enabled)?;
        load_env_var("WATCH_FAILURE_THRESHOLD", &mut config.failure_threshold)?;
        load_env_millis("WATCH_BASE_RETRY_DELAY_MS", &mut config.base_retry_delay)?;
        load_env_millis("WATCH_MAX_RETRY_DELAY_MS", &mut config.max_retry_delay)?;
        load_env_var(
            "WATCH_MAX_CRITICAL_BUFFER_SIZE",
            &mut config.max_critical_buffer_size,
        )?;
        load_env_millis(
            "WATCH_SHUTDOWN_GRACE_PERIOD_MS",
            &mut config.shutdown_grace_period,
        )?;
        load_env_millis("WATCH_REQUEST_TIMEOUT_MS", &mut config.request_timeout)?;
        load_env_millis("WATCH_CONNECTION_TIMEOUT_MS", &mut config.connection_timeout)?;
        load_env_var("WATCH_MAX_CONNECTIONS", &mut config.max_connections)?;
        load_env_enum("WATCH_WIRE_FORMAT", &mut config.wire_format)?;
        load_env_enum("WATCH_DESTINATION", &mut config.destination)?;
        load_env_enum("WATCH_MATCH_MODE", &mut config.match_mode)?;
        load_env_var("WATCH_DEFAULT_LEVEL", &mut config.default_level)?;
        load_env_var("WATCH_LOG_LEVEL", &mut config.log_level)?;
        load_env_var("WATCH_REMOTE_SWITCHES", &mut config.remote_switches)?;

        config.validate()?;
        Ok(config)
    }

    pub fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            domain: self.domain.clone(),
            batch_size: self.batch_size,
            flush_interval: self.flush_interval,
            circuit: CircuitConfig {
                failure_threshold: self.failure_threshold,
                base_retry_delay: self.base_retry_delay,
                max_retry_delay: self.max_retry_delay,
            },
            max_critical_buffer_size: self.max_critical_buffer_size,
            shutdown_grace_period: self.shutdown_grace_period,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: self.request_timeout,
            connection_timeout: self.connection_timeout,
            max_connections: self.max_connections,
            ..ClientConfig::default()
        }
    }

    pub fn poller_options(&self) -> PollerOptions {
        PollerOptions {
            poll_interval: self.poll_interval,
            polling_enabled: self.polling_enabled,
            ..PollerOptions::default()
        }
    }
}
