//! Serializable resilience settings
//!
//! Mirrors the runtime configs with plain numbers (durations in
//! milliseconds) so they can be loaded from TOML or the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::{BackoffConfig, CircuitBreakerConfig, RateLimitConfig};
use crate::Result;

/// Settings for the whole pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Token bucket settings
    #[serde(default)]
    pub limiter: LimiterSettings,
    /// Circuit breaker settings
    #[serde(default)]
    pub breaker: BreakerSettings,
    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,
}

impl ResilienceSettings {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.limiter.to_config().validate()?;
        self.breaker.to_config().validate()?;
        self.retry.to_config().validate()
    }
}

/// Token bucket settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Tokens per second
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// Bucket size
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            burst: default_burst(),
        }
    }
}

impl LimiterSettings {
    /// Convert into a runtime config
    pub fn to_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate, self.burst)
    }
}

fn default_rate() -> f64 {
    10.0
}
fn default_burst() -> u32 {
    1
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Breaker name, used in logs and metric labels
    #[serde(default = "default_breaker_name")]
    pub name: String,
    /// Open-state duration before a trial request
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Requests needed before the breaker may trip
    #[serde(default = "default_min_request_threshold")]
    pub min_request_threshold: u32,
    /// Failure ratio that trips the breaker
    #[serde(default = "default_failure_ratio_threshold")]
    pub failure_ratio_threshold: f64,
    /// Closed-state count reset period; unset keeps counts until a transition
    #[serde(default)]
    pub count_interval_ms: Option<u64>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: default_breaker_name(),
            timeout_ms: default_timeout_ms(),
            min_request_threshold: default_min_request_threshold(),
            failure_ratio_threshold: default_failure_ratio_threshold(),
            count_interval_ms: None,
        }
    }
}

impl BreakerSettings {
    /// Convert into a runtime config
    pub fn to_config(&self) -> CircuitBreakerConfig {
        let config = CircuitBreakerConfig::new()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_min_request_threshold(self.min_request_threshold)
            .with_failure_ratio_threshold(self.failure_ratio_threshold);
        match self.count_interval_ms {
            Some(ms) => config.with_count_interval(Duration::from_millis(ms)),
            None => config,
        }
    }
}

fn default_breaker_name() -> String {
    "market-api".to_string()
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_min_request_threshold() -> u32 {
    3
}
fn default_failure_ratio_threshold() -> f64 {
    0.4
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Randomize delays by +/-20%
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

impl RetrySettings {
    /// Convert into a runtime config
    pub fn to_config(&self) -> BackoffConfig {
        BackoffConfig::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_jitter(self.jitter)
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    2_000
}
fn default_true() -> bool {
    true
}
