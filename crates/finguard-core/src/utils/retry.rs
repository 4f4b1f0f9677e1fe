//! Retry logic with exponential backoff
//!
//! Provides bounded, cancellable retries for transient failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lower bound of the jitter factor applied to a backoff delay
const JITTER_MIN: f64 = 0.8;
/// Upper bound of the jitter factor applied to a backoff delay
const JITTER_MAX: f64 = 1.2;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound for the un-jittered delay
    pub max_delay: Duration,
    /// Scale each delay by a random factor in [0.8, 1.2]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Create a new retry configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of retries
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of attempts the executor will make
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> crate::Result<()> {
        if self.base_delay.is_zero() {
            return Err(crate::Error::invalid_config(
                "base_delay",
                "must be greater than zero",
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(crate::Error::invalid_config(
                "max_delay",
                format!(
                    "must be >= base_delay ({:?}), got {:?}",
                    self.base_delay, self.max_delay
                ),
            ));
        }
        Ok(())
    }

    /// Un-jittered delay after the failed attempt with 0-based index `attempt`:
    /// `min(max_delay, base_delay * 2^attempt)`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |backoff| backoff.min(self.max_delay))
    }

    /// Delay to sleep after attempt `attempt`, jittered when enabled
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX))
        } else {
            delay
        }
    }
}

/// Error type for retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed, or an attempt failed with a
    /// non-retryable error
    #[error("operation failed after {attempts} attempts: {last_error}")]
    Exhausted {
        /// The last error encountered
        last_error: E,
        /// Total number of attempts made
        attempts: u32,
    },

    /// The cancellation token fired before the retries finished
    #[error("retry cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made before cancellation was observed
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// Whether the loop stopped because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last operation error, if the loop was not cancelled
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Execute an async operation with retry logic
///
/// Runs `operation` up to `config.max_attempts()` times. Between failed
/// attempts it sleeps for the backoff delay; if `cancel` fires during that
/// sleep, or an attempt fails after `cancel` fired, [`RetryError::Cancelled`]
/// is returned and the operation is not invoked again.
///
/// # Arguments
/// * `cancel` - Cancellation token checked around every attempt and delay
/// * `config` - Backoff configuration
/// * `operation` - Async operation to retry
/// * `is_retryable` - Function to determine if an error should trigger a retry
///
/// # Example
/// ```ignore
/// let config = BackoffConfig::default();
/// let result = retry_with_backoff(
///     &cancel,
///     &config,
///     || async { fetch_quote().await },
///     |e| e.is_transient(),
/// ).await;
/// ```
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    cancel: &CancellationToken,
    config: &BackoffConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let max_attempts = config.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts: attempt });
        }

        let result = operation().await;
        attempt += 1;

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if cancel.is_cancelled() {
            debug!(attempt = attempt, error = ?error, "Operation failed after cancellation");
            return Err(RetryError::Cancelled { attempts: attempt });
        }

        if attempt >= max_attempts || !is_retryable(&error) {
            debug!(
                attempt = attempt,
                error = ?error,
                "Operation failed, no more retries"
            );
            return Err(RetryError::Exhausted {
                last_error: error,
                attempts: attempt,
            });
        }

        let delay = config.calculate_delay(attempt - 1);
        warn!(
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = ?error,
            "Operation failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempt = attempt, "Retry cancelled during backoff");
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            _ = sleep(delay) => {}
        }
    }
}
