//! Resilience utilities
//!
//! Provides the pipeline building blocks:
//! - rate_limiter: Token bucket admission control
//! - retry: Retry logic with exponential backoff
//! - circuit_breaker: Circuit breaker pattern for fault tolerance
//! - metrics: Lightweight metrics collection

mod circuit_breaker;
pub mod metrics;
mod rate_limiter;
mod retry;

pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState, Counts, StateChangeHook,
};
pub use metrics::{
    global as metrics_global, HistogramSnapshot, LabeledCounter, LabeledGauge, LabeledHistogram,
    MetricsRegistry,
};
pub use rate_limiter::{RateLimitConfig, RateLimitError, RateLimiter};
pub use retry::{retry_with_backoff, BackoffConfig, RetryError};
