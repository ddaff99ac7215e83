//! Configuration for governors and the HTTP client wrapper.
//!
//! All fields have defaults so a minimal (or empty) TOML file is valid.
//! Syntax is checked by serde, semantics by `validate()`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ConfigError;

/// Fixed-at-construction settings of one `RequestGovernor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GovernorConfig {
    /// Maximum number of items holding a slot at once.
    pub max_concurrency: usize,

    /// Total attempts per item, first attempt included.
    pub max_attempts: u32,

    /// Backoff after the first failed attempt; doubles per attempt.
    pub base_delay_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl GovernorConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid(format!(
                "max_concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "base_delay_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of the HTTP client wrapper (`ApiClient` + `ReqwestExecutor`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Relative request paths are joined onto this. Empty means absolute URLs only.
    pub base_url: String,

    /// Per-request deadline enforced by the executor.
    pub timeout_ms: u64,

    pub user_agent: String,

    pub governor: GovernorConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: 30_000,
            user_agent: concat!("tollgate/", env!("CARGO_PKG_VERSION")).to_string(),
            governor: GovernorConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !self.base_url.is_empty() {
            url::Url::parse(&self.base_url).map_err(|e| {
                ConfigError::Invalid(format!("base_url {:?} is not a valid URL: {e}", self.base_url))
            })?;
        }
        self.governor.validate()
    }
}
