use super::{ConfigError, WatchConfig};
use url::Url;

impl WatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;

        if self.domain.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Domain must not be blank".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.flush_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Flush interval must be greater than 0".to_string(),
            ));
        }

        if self.polling_enabled && self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Poll interval must be greater than 0 when polling is enabled".to_string(),
            ));
        }

        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidConfig(
                "Failure threshold must be at least 1".to_string(),
            ));
        }

        if self.base_retry_delay > self.max_retry_delay {
            return Err(ConfigError::InvalidConfig(format!(
                "Base retry delay ({:?}) must not exceed max retry delay ({:?})",
                self.base_retry_delay, self.max_retry_delay
            )));
        }

        if self.max_critical_buffer_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Critical buffer size must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.connection_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.switches.iter().any(|def| def.pattern.trim().is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "Switch patterns must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}
