//! Configuration shapes for the facade, action engine, and services.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, CoreCacheError};

/// Default per-call options applied by the Cache Facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultOptions {
    pub timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub throw_on_error: bool,
}

impl Default for DefaultOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            retries: 2,
            retry_delay_ms: 50,
            throw_on_error: true,
        }
    }
}

/// Facade configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacadeConfig {
    /// Prefix applied to every key.
    pub key_prefix: Option<String>,
    pub default_ttl_seconds: Option<u64>,
    pub default_options: DefaultOptions,
    pub enable_metrics: bool,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            key_prefix: None,
            default_ttl_seconds: None,
            default_options: DefaultOptions::default(),
            enable_metrics: true,
        }
    }
}

impl FacadeConfig {
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_default_ttl_seconds(mut self, ttl: u64) -> Self {
        self.default_ttl_seconds = Some(ttl);
        self
    }

    pub fn with_default_options(mut self, options: DefaultOptions) -> Self {
        self.default_options = options;
        self
    }
}

/// Failure strategy for an action run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategy {
    Abort,
    #[default]
    SkipDependents,
    Continue,
}

/// Configuration for a single action run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecuteConfig {
    pub error_strategy: ErrorStrategy,
    pub step_timeout_ms: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub rollback_on_failure: bool,
}

impl Default for ActionExecuteConfig {
    fn default() -> Self {
        Self {
            error_strategy: ErrorStrategy::SkipDependents,
            step_timeout_ms: None,
            retries: 0,
            retry_delay_ms: 0,
            rollback_on_failure: false,
        }
    }
}

/// A single endpoint's rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_requests: u64,
    pub window_seconds: u64,
}

/// Rate-limit service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub key_prefix: String,
    pub default_config: WindowLimit,
    pub endpoints: std::collections::HashMap<String, WindowLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            key_prefix: "ratelimit".to_string(),
            default_config: WindowLimit {
                max_requests: 100,
                window_seconds: 60,
            },
            endpoints: std::collections::HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Resolve the window limit for an endpoint, falling back to the default.
    pub fn limit_for(&self, endpoint: &str) -> WindowLimit {
        self.endpoints
            .get(endpoint)
            .copied()
            .unwrap_or(self.default_config)
    }
}

/// Lock service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    pub key_prefix: String,
    pub default_ttl_ms: u64,
    pub default_timeout_ms: u64,
    pub default_retry_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: "lock".to_string(),
            default_ttl_ms: 10_000,
            default_timeout_ms: 5_000,
            default_retry_interval_ms: 100,
        }
    }
}

impl LockConfig {
    pub fn validate(&self) -> Result<(), CoreCacheError> {
        if self.default_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.default_retry_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_retry_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_config_falls_back_to_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limit_for("unknown").max_requests, 100);
    }

    #[test]
    fn lock_config_rejects_zero_ttl() {
        let mut config = LockConfig::default();
        config.default_ttl_ms = 0;
        assert!(config.validate().is_err());
    }
}
