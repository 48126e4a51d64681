//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Default seconds an entry stays fresh after being written
pub const DEFAULT_EXPIRE_AFTER_WRITE: i64 = 300;
/// Default seconds between auto-refresh ticks
pub const DEFAULT_REFRESH_INTERVAL: i64 = 60;
/// Default seconds a background refresh may run before its result is discarded
pub const DEFAULT_REFRESH_TIMEOUT: i64 = 30;

/// Cache configuration parameters.
///
/// Durations are whole seconds. Negative values are rejected by
/// [`CacheConfig::validate`], never clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds an entry stays fresh after being written, 0 = never expire
    pub expire_after_write_secs: i64,
    /// Seconds between auto-refresh ticks, 0 = no background refresh
    pub refresh_interval_secs: i64,
    /// Seconds a background refresh may take, 0 = unbounded
    pub refresh_timeout_secs: i64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_EXPIRE_AFTER_WRITE` - Freshness window in seconds (default: 300)
    /// - `CACHE_REFRESH_INTERVAL` - Auto refresh period in seconds (default: 60)
    /// - `CACHE_REFRESH_TIMEOUT` - Background refresh timeout in seconds (default: 30)
    ///
    /// # Errors
    /// `CacheError::Configuration` if a variable is set but is not a
    /// non-negative integer.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            expire_after_write_secs: env_secs("CACHE_EXPIRE_AFTER_WRITE", DEFAULT_EXPIRE_AFTER_WRITE)?,
            refresh_interval_secs: env_secs("CACHE_REFRESH_INTERVAL", DEFAULT_REFRESH_INTERVAL)?,
            refresh_timeout_secs: env_secs("CACHE_REFRESH_TIMEOUT", DEFAULT_REFRESH_TIMEOUT)?,
        };
        config.validate()?;
        Ok(config)
    }

    // == Builders ==
    pub fn with_expire_after_write(mut self, secs: i64) -> Self {
        self.expire_after_write_secs = secs;
        self
    }

    pub fn with_refresh_interval(mut self, secs: i64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn with_refresh_timeout(mut self, secs: i64) -> Self {
        self.refresh_timeout_secs = secs;
        self
    }

    // == Validation ==
    /// Checks that every duration is non-negative.
    pub fn validate(&self) -> Result<()> {
        validate_secs("expire_after_write", self.expire_after_write_secs)?;
        validate_secs("refresh_interval", self.refresh_interval_secs)?;
        validate_secs("refresh_timeout", self.refresh_timeout_secs)?;
        Ok(())
    }

    /// Auto refresh period, None when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        positive_duration(self.refresh_interval_secs)
    }

    /// Background refresh timeout, None when unbounded.
    pub fn refresh_timeout(&self) -> Option<Duration> {
        positive_duration(self.refresh_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expire_after_write_secs: DEFAULT_EXPIRE_AFTER_WRITE,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Rejects negative second counts.
pub(crate) fn validate_secs(name: &str, secs: i64) -> Result<u64> {
    u64::try_from(secs).map_err(|_| {
        CacheError::Configuration(format!("{} should be >= 0 (0 disables it), got {}", name, secs))
    })
}

fn positive_duration(secs: i64) -> Option<Duration> {
    u64::try_from(secs)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn env_secs(var: &str, default: i64) -> Result<i64> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            CacheError::Configuration(format!("{} is not a whole number of seconds: {:?}", var, raw))
        }),
        Err(_) => Ok(default),
    }
}
