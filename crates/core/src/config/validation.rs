//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - any cache size is 0, or the pressure ceilings are not ordered
    ///   `high <= medium <= max`
    /// - `cache_ttl_ms` or `memory_check_interval_ms` is under one second
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `gmail_base_url` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_size == 0 {
            return Err(ConfigError::Invalid { field: "max_cache_size".into(), reason: "must be greater than 0".into() });
        }
        if self.high_pressure_cache_size == 0 {
            return Err(ConfigError::Invalid {
                field: "high_pressure_cache_size".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.medium_pressure_cache_size > self.max_cache_size {
            return Err(ConfigError::Invalid {
                field: "medium_pressure_cache_size".into(),
                reason: "must not exceed max_cache_size".into(),
            });
        }
        if self.high_pressure_cache_size > self.medium_pressure_cache_size {
            return Err(ConfigError::Invalid {
                field: "high_pressure_cache_size".into(),
                reason: "must not exceed medium_pressure_cache_size".into(),
            });
        }

        if self.cache_ttl_ms < 1_000 {
            return Err(ConfigError::Invalid { field: "cache_ttl_ms".into(), reason: "must be at least 1000ms".into() });
        }
        if self.memory_check_interval_ms < 1_000 {
            return Err(ConfigError::Invalid {
                field: "memory_check_interval_ms".into(),
                reason: "must be at least 1000ms".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.gmail_base_url.is_empty() {
            return Err(ConfigError::Invalid { field: "gmail_base_url".into(), reason: "must not be empty".into() });
        }

        if self.prefetch_delay_ms == 0 {
            tracing::warn!("prefetch_delay_ms is 0; background prefetches will run back to back");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_cache_size_zero() {
        let config = AppConfig {
            max_cache_size: 0,
            medium_pressure_cache_size: 0,
            high_pressure_cache_size: 0,
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_cache_size"));
    }

    #[test]
    fn test_validate_unordered_ceilings() {
        let config = AppConfig { medium_pressure_cache_size: 20, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "medium_pressure_cache_size"));

        let config = AppConfig { high_pressure_cache_size: 6, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "high_pressure_cache_size"));
    }

    #[test]
    fn test_validate_ttl_too_small() {
        let config = AppConfig { cache_ttl_ms: 999, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_ms"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            max_cache_size: 1,
            medium_pressure_cache_size: 1,
            high_pressure_cache_size: 1,
            cache_ttl_ms: 1_000,
            timeout_ms: 100,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
