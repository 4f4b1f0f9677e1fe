//! Rate limiting for outbound calls
//!
//! Token bucket limiter: tokens refill continuously at `rate` per second up to
//! `burst`, each admitted call consumes one. Waiters are served in arrival
//! order because the bucket lock is a fair (FIFO) async mutex held while a
//! waiter sleeps for its token.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Slack for float drift after sleeping exactly until a token is due
const TOKEN_EPSILON: f64 = 1e-9;

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Tokens added per second (0 = never admit)
    pub rate: f64,
    /// Maximum bucket size
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: 10.0,
            burst: 1,
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit config
    #[must_use]
    pub fn new(rate: f64, burst: u32) -> Self {
        Self { rate, burst }
    }

    /// Create config for `rate` requests per second with no burst
    #[must_use]
    pub fn per_second(rate: f64) -> Self {
        Self::new(rate, 1)
    }

    /// Set the refill rate
    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Set the bucket size
    #[must_use]
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> crate::Result<()> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(crate::Error::invalid_config(
                "rate",
                format!("must be a finite number >= 0, got {}", self.rate),
            ));
        }
        if self.burst == 0 {
            return Err(crate::Error::invalid_config("burst", "must be at least 1"));
        }
        Ok(())
    }
}

/// Error returned when a wait for a token is abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// The caller cancelled while waiting for a token
    #[error("rate limit wait cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_refill = now;
    }
}

/// Token bucket rate limiter shared by every caller of one endpoint
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create a new rate limiter with a full bucket.
    ///
    /// Out-of-range values are clamped: a negative or non-finite rate admits
    /// nothing, a zero burst behaves as a burst of one. Use
    /// [`RateLimitConfig::validate`] to reject them instead.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let rate = if config.rate.is_finite() && config.rate > 0.0 {
            config.rate
        } else {
            0.0
        };
        let burst = f64::from(config.burst.max(1));
        Self {
            rate,
            burst,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Tokens added per second
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum bucket size
    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    /// Wait until a token is available and consume it.
    ///
    /// Returns [`RateLimitError::Cancelled`] without consuming a token if
    /// `cancel` fires first, including while queued behind other waiters.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        let mut bucket = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            guard = self.bucket.lock() => guard,
        };

        loop {
            bucket.refill(Instant::now(), self.rate, self.burst);
            if bucket.tokens + TOKEN_EPSILON >= 1.0 {
                bucket.tokens = (bucket.tokens - 1.0).max(0.0);
                return Ok(());
            }

            // A zero rate, or one so small the wait overflows Duration, never refills
            let Some(wait) = self.time_to_next_token(bucket.tokens) else {
                debug!(rate = self.rate, "Rate limiter admits nothing, waiting for cancellation");
                cancel.cancelled().await;
                return Err(RateLimitError::Cancelled);
            };
            debug!(
                wait_ms = wait.as_millis() as u64,
                tokens = bucket.tokens,
                "Waiting for rate limit token"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = sleep(wait) => {}
            }
        }
    }

    fn time_to_next_token(&self, tokens: f64) -> Option<Duration> {
        if self.rate == 0.0 {
            return None;
        }
        Duration::try_from_secs_f64((1.0 - tokens) / self.rate).ok()
    }

    /// Consume a token if one is available right now.
    ///
    /// Returns `false` when the bucket is empty or other callers are already
    /// queued for it.
    pub fn try_acquire(&self) -> bool {
        let Ok(mut bucket) = self.bucket.try_lock() else {
            return false;
        };
        bucket.refill(Instant::now(), self.rate, self.burst);
        if bucket.tokens + TOKEN_EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// Current token count after refilling
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.rate, self.burst);
        bucket.tokens
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            rate: self.rate,
            burst: self.burst,
            bucket: Arc::clone(&self.bucket),
        }
    }
}
