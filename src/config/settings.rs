//! Client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};
use crate::retry::RetryPolicy;

/// Largest page the Redmine API will return for a listing.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default number of attempts for every remote call.
pub const DEFAULT_TOTAL_ATTEMPTS: u32 = 5;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_BASE_RETRY_INTERVAL_MS: u64 = 5000;

/// Default cache expiration in minutes.
pub const DEFAULT_CACHE_TTL_MINUTES: u32 = 10;

/// Per-client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// How many times a remote call is attempted before giving up.
    pub total_attempts: u32,
    /// Delay before the first retry; doubles after every failure.
    pub base_retry_interval_ms: u64,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Absolute lifetime of a cache entry in minutes.
    pub cache_ttl_minutes: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            total_attempts: DEFAULT_TOTAL_ATTEMPTS,
            base_retry_interval_ms: DEFAULT_BASE_RETRY_INTERVAL_MS,
            page_size: MAX_PAGE_SIZE,
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
        }
    }
}

impl ClientSettings {
    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.total_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "total_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_retry_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "base_retry_interval_ms must be positive".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "page_size must be positive".to_string(),
            ));
        }
        if self.cache_ttl_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "cache_ttl_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Page size clamped to what the backend accepts.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// The retry policy described by these settings.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(self.total_attempts, self.base_retry_interval_ms)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Cache entry lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.cache_ttl_minutes) * 60)
    }
}
