//! Error types for finguard-market

use thiserror::Error;

/// Failure of the raw, unprotected price source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The upstream call failed
    #[error("{0}")]
    Network(String),

    /// The caller's token fired while the call was in flight
    #[error("request cancelled")]
    Cancelled,
}

/// Market data error type
#[derive(Debug, Error)]
pub enum Error {
    /// Cancelled while waiting for a rate limit token
    #[error("cancelled while waiting for rate limit token")]
    RateLimitCancelled,

    /// The circuit breaker rejected the attempt
    #[error("circuit breaker '{name}' is open")]
    BreakerOpen {
        /// Breaker name
        name: String,
    },

    /// The price source was called and failed
    #[error("operation failed: {0}")]
    OperationFailed(#[from] SourceError),

    /// Every retry attempt failed; `source` is the last attempt's error
    #[error("retry exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Attempts made
        attempts: u32,
        /// Last attempt error
        source: Box<Error>,
    },

    /// Cancelled during a retry delay or an attempt
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the error came from the caller's cancellation token
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::RateLimitCancelled | Error::Cancelled => true,
            Error::OperationFailed(e) => *e == SourceError::Cancelled,
            Error::RetryExhausted { source, .. } => source.is_cancelled(),
            Error::BreakerOpen { .. } => false,
        }
    }

    /// Label for the `type` dimension of the error counter
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::RateLimitCancelled => "rate_limit",
            Error::BreakerOpen { .. } => "circuit_open",
            Error::OperationFailed(SourceError::Network(_)) => "network",
            Error::OperationFailed(SourceError::Cancelled) | Error::Cancelled => "cancelled",
            Error::RetryExhausted { source, .. } => source.error_type(),
        }
    }

    /// The most specific cause, looking through retry exhaustion
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::RateLimitCancelled => "⏳ Cancelled while waiting for the rate limiter.".to_string(),
            Error::BreakerOpen { name } => {
                format!("🔌 The '{}' circuit is open, calls are paused.", name)
            }
            Error::OperationFailed(e) => format!("🌐 Market data request failed: {}", e),
            Error::RetryExhausted { attempts, source } => {
                format!(
                    "🔁 Gave up after {} attempts. Last error: {}",
                    attempts,
                    source.user_message()
                )
            }
            Error::Cancelled => "🛑 Request cancelled.".to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self.root_cause() {
            Error::BreakerOpen { .. } => Some(
                "The upstream is failing. Wait for the breaker timeout before retrying."
                    .to_string(),
            ),
            Error::OperationFailed(SourceError::Network(_)) => {
                Some("Check connectivity or raise retry.max_retries in the config.".to_string())
            }
            _ => None,
        }
    }
}
