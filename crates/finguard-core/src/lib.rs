//! Finguard Core - Resilience Primitives
//!
//! This crate provides the building blocks that protect calls into an
//! unreliable, latency-variable dependency:
//! - Rate limiting: token bucket admission control with FIFO waiters
//! - Retry: exponential backoff with jitter, cancellable
//! - Circuit breaker: three-state failure isolation with generation tracking
//! - Metrics: labeled counters, gauges and histograms with Prometheus export
//! - Settings: serializable configuration for the pipeline

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod settings;
pub mod utils;

pub use error::{Error, Result};
pub use settings::{BreakerSettings, LimiterSettings, ResilienceSettings, RetrySettings};
pub use utils::{
    metrics_global, retry_with_backoff, BackoffConfig, BreakerError, CircuitBreaker,
    CircuitBreakerConfig, CircuitState, Counts, HistogramSnapshot, LabeledCounter, LabeledGauge,
    LabeledHistogram, MetricsRegistry, RateLimitConfig, RateLimitError, RateLimiter, RetryError,
    StateChangeHook,
};

// Re-export so downstream crates share one cancellation type
pub use tokio_util::sync::CancellationToken;
