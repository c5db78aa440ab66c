//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MAILCACHE_*)
//! 2. TOML config file (if MAILCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

use crate::cache::CacheSettings;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MAILCACHE_*)
/// 2. TOML config file (if MAILCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OAuth access token for the Gmail REST API.
    ///
    /// Set via MAILCACHE_GMAIL_ACCESS_TOKEN environment variable.
    /// Obtaining and refreshing it is the host application's job.
    #[serde(default)]
    pub gmail_access_token: Option<String>,

    /// Base URL of the Gmail user endpoint.
    ///
    /// Set via MAILCACHE_GMAIL_BASE_URL environment variable.
    #[serde(default = "default_gmail_base_url")]
    pub gmail_base_url: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MAILCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Also bounds how long a hung prefetch can hold the single-flight slot.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of pages kept under low memory pressure.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Page ceiling under medium memory pressure.
    #[serde(default = "default_medium_pressure_cache_size")]
    pub medium_pressure_cache_size: usize,

    /// Page ceiling under high memory pressure.
    #[serde(default = "default_high_pressure_cache_size")]
    pub high_pressure_cache_size: usize,

    /// Page time-to-live in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Memory sampling interval in milliseconds.
    #[serde(default = "default_memory_check_interval_ms")]
    pub memory_check_interval_ms: u64,

    /// Pause between consecutive prefetches in milliseconds.
    #[serde(default = "default_prefetch_delay_ms")]
    pub prefetch_delay_ms: u64,

    /// Delay before queueing the page after the next page, in milliseconds.
    #[serde(default = "default_lookahead_delay_ms")]
    pub lookahead_delay_ms: u64,
}

fn default_gmail_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1/users/me".into()
}

fn default_user_agent() -> String {
    "mailcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_cache_size() -> usize {
    10
}

fn default_medium_pressure_cache_size() -> usize {
    5
}

fn default_high_pressure_cache_size() -> usize {
    2
}

fn default_cache_ttl_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_memory_check_interval_ms() -> u64 {
    30_000
}

fn default_prefetch_delay_ms() -> u64 {
    500
}

fn default_lookahead_delay_ms() -> u64 {
    1_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gmail_access_token: None,
            gmail_base_url: default_gmail_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_cache_size: default_max_cache_size(),
            medium_pressure_cache_size: default_medium_pressure_cache_size(),
            high_pressure_cache_size: default_high_pressure_cache_size(),
            cache_ttl_ms: default_cache_ttl_ms(),
            memory_check_interval_ms: default_memory_check_interval_ms(),
            prefetch_delay_ms: default_prefetch_delay_ms(),
            lookahead_delay_ms: default_lookahead_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before the second-order lookahead page is queued.
    pub fn lookahead_delay(&self) -> Duration {
        Duration::from_millis(self.lookahead_delay_ms)
    }

    /// Cache sizing, expiry and scheduling knobs derived from this config.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_cache_size: self.max_cache_size,
            medium_pressure_cache_size: self.medium_pressure_cache_size,
            high_pressure_cache_size: self.high_pressure_cache_size,
            ttl: Duration::from_millis(self.cache_ttl_ms),
            memory_check_interval: Duration::from_millis(self.memory_check_interval_ms),
            prefetch_delay: Duration::from_millis(self.prefetch_delay_ms),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MAILCACHE_`
    /// 2. TOML file from `MAILCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MAILCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MAILCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if the Gmail access token is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token is not set.
    pub fn require_gmail_access_token(&self) -> Result<&str, ConfigError> {
        self.gmail_access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "gmail_access_token".into(),
                hint: "Set MAILCACHE_GMAIL_ACCESS_TOKEN environment variable".into(),
            })
    }
}
