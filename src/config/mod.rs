//! # Configuration
//!
//! Declarative configuration for the failover engine. Every section has
//! working defaults, so an empty file (or no file at all) yields a usable
//! configuration; files and `FAILOVER_`-prefixed environment variables
//! override per field.
//!
//! Durations are declared in milliseconds in files and converted to typed
//! runtime configs at the component boundary.

pub mod loader;

pub use loader::ConfigManager;

use crate::orchestration::{PollerConfig, WaveCoordinatorConfig};
use crate::resilience::{RateLimitConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(default)]
    pub rate_limiter: RateLimiterSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub poller: PollerSection,
    #[serde(default)]
    pub coordinator: CoordinatorSection,
}

impl FailoverConfig {
    /// Reject values that would make the engine misbehave silently
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rate_limiter.refill_rate_per_sec <= 0.0 {
            return Err(ConfigurationError::InvalidValue {
                field: "rate_limiter.refill_rate_per_sec".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.rate_limiter.capacity < 1.0 {
            return Err(ConfigurationError::InvalidValue {
                field: "rate_limiter.capacity".to_string(),
                reason: "must allow at least one token".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poller.max_concurrency == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "poller.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poller.page_size == 0 || self.coordinator.awaiting_page_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "page_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poller.early_phase_ms >= self.poller.late_phase_ms {
            return Err(ConfigurationError::InvalidValue {
                field: "poller.early_phase_ms".to_string(),
                reason: "must be below poller.late_phase_ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            refill_rate: self.rate_limiter.refill_rate_per_sec,
            capacity: self.rate_limiter.capacity,
            acquire_timeout: Duration::from_millis(self.rate_limiter.acquire_timeout_ms),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: Duration::from_millis(self.retry.jitter_ms),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            page_size: self.poller.page_size,
            max_concurrency: self.poller.max_concurrency,
            task_timeout: Duration::from_millis(self.poller.task_timeout_ms),
            fast_interval: Duration::from_millis(self.poller.fast_interval_ms),
            standard_interval: Duration::from_millis(self.poller.standard_interval_ms),
            slow_interval: Duration::from_millis(self.poller.slow_interval_ms),
            early_phase: Duration::from_millis(self.poller.early_phase_ms),
            late_phase: Duration::from_millis(self.poller.late_phase_ms),
        }
    }

    pub fn coordinator_config(&self) -> WaveCoordinatorConfig {
        WaveCoordinatorConfig {
            awaiting_page_size: self.coordinator.awaiting_page_size,
        }
    }
}

/// Token-bucket settings per (region, account) key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterSection {
    pub refill_rate_per_sec: f64,
    pub capacity: f64,
    pub acquire_timeout_ms: u64,
}

impl Default for RateLimiterSection {
    fn default() -> Self {
        Self {
            refill_rate_per_sec: 10.0,
            capacity: 20.0,
            acquire_timeout_ms: 10_000,
        }
    }
}

/// Exponential backoff settings for transient recovery-service errors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

/// Completion-poller cadence and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    pub page_size: usize,
    pub max_concurrency: usize,
    pub task_timeout_ms: u64,
    pub fast_interval_ms: u64,
    pub standard_interval_ms: u64,
    pub slow_interval_ms: u64,
    pub early_phase_ms: u64,
    pub late_phase_ms: u64,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_concurrency: 8,
            task_timeout_ms: 30 * 60 * 1000,
            fast_interval_ms: 15_000,
            standard_interval_ms: 30_000,
            slow_interval_ms: 60_000,
            early_phase_ms: 2 * 60 * 1000,
            late_phase_ms: 20 * 60 * 1000,
        }
    }
}

/// Wave-coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    pub awaiting_page_size: usize,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            awaiting_page_size: 100,
        }
    }
}
