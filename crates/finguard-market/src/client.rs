//! Resilient price client
//!
//! Every call goes through the fixed pipeline:
//! rate limiter -> retry loop -> (per attempt) circuit breaker -> price source.

use std::sync::Arc;

use async_trait::async_trait;
use finguard_core::{
    retry_with_backoff, BackoffConfig, BreakerError, CircuitBreaker, RateLimiter,
    ResilienceSettings, RetryError,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result, SourceError};
use crate::metrics::{AttemptStatus, ResilienceMetrics};
use crate::price::Price;
use crate::provider::{PriceProvider, PriceSource};

/// `method` label for price requests
const METHOD_GET_PRICE: &str = "get_price";

/// Price client guarded by a rate limiter, a retry loop and a circuit breaker
pub struct ResilientPriceClient {
    provider: String,
    source: Arc<dyn PriceSource>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    backoff: BackoffConfig,
    metrics: ResilienceMetrics,
}

impl std::fmt::Debug for ResilientPriceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientPriceClient")
            .field("provider", &self.provider)
            .field("limiter", &self.limiter)
            .field("breaker", &self.breaker)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ResilientPriceClient {
    /// Create a client around shared limiter and breaker instances.
    ///
    /// Metrics go to a private registry until [`Self::with_metrics`] is used.
    /// Attach [`ResilienceMetrics::state_change_hook`] to the breaker to keep
    /// the state gauge current across transitions.
    pub fn new(
        provider: impl Into<String>,
        source: Arc<dyn PriceSource>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        backoff: BackoffConfig,
    ) -> Self {
        let client = Self {
            provider: provider.into(),
            source,
            limiter,
            breaker,
            backoff,
            metrics: ResilienceMetrics::default(),
        };
        client.publish_breaker_state();
        client
    }

    /// Build the whole pipeline from settings, wiring the breaker gauge
    pub fn from_settings(
        provider: impl Into<String>,
        source: Arc<dyn PriceSource>,
        settings: &ResilienceSettings,
        metrics: ResilienceMetrics,
    ) -> finguard_core::Result<Self> {
        settings.validate()?;

        let limiter = Arc::new(RateLimiter::new(settings.limiter.to_config()));
        let breaker = Arc::new(
            CircuitBreaker::new(settings.breaker.name.clone(), settings.breaker.to_config())
                .with_state_change_hook(metrics.state_change_hook()),
        );

        Ok(Self::new(
            provider,
            source,
            limiter,
            breaker,
            settings.retry.to_config(),
        )
        .with_metrics(metrics))
    }

    /// Record into `metrics` instead of the private registry
    #[must_use]
    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = metrics;
        self.publish_breaker_state();
        self
    }

    /// Provider label used in metrics
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The shared rate limiter
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The shared circuit breaker
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// The metrics this client records into
    pub fn metrics(&self) -> &ResilienceMetrics {
        &self.metrics
    }

    /// Fetch a price through the pipeline.
    ///
    /// Cancellation wins at every stage: while queued for a token it yields
    /// [`Error::RateLimitCancelled`], afterwards [`Error::Cancelled`].
    pub async fn call(&self, cancel: &CancellationToken, symbol: &str) -> Result<Price> {
        if self.limiter.wait(cancel).await.is_err() {
            self.metrics.record_rate_limit_rejection(&self.provider);
            debug!(provider = %self.provider, symbol = %symbol, "Cancelled waiting for rate limit token");
            return Err(Error::RateLimitCancelled);
        }

        let result = retry_with_backoff(
            cancel,
            &self.backoff,
            || self.attempt(cancel, symbol),
            |e: &Error| !e.is_cancelled(),
        )
        .await;

        match result {
            Ok(price) => Ok(price),
            Err(RetryError::Cancelled { attempts }) => {
                debug!(provider = %self.provider, symbol = %symbol, attempts = attempts, "Price request cancelled");
                Err(Error::Cancelled)
            }
            Err(RetryError::Exhausted {
                last_error,
                attempts,
            }) => {
                if last_error.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                warn!(
                    provider = %self.provider,
                    symbol = %symbol,
                    attempts = attempts,
                    error = %last_error,
                    "Price request failed"
                );
                Err(Error::RetryExhausted {
                    attempts,
                    source: Box::new(last_error),
                })
            }
        }
    }

    /// One attempt through the breaker. A cancelled attempt records neither
    /// outcome, whether it is dropped here or the source reports the
    /// cancellation itself.
    async fn attempt(&self, cancel: &CancellationToken, symbol: &str) -> Result<Price> {
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.breaker.execute_unless(
                || self.source.fetch_price(cancel, symbol),
                |e: &SourceError| *e == SourceError::Cancelled,
            ) => {
                result.map_err(|e| match e {
                    BreakerError::Open { name } => Error::BreakerOpen { name },
                    BreakerError::Operation(source) => Error::OperationFailed(source),
                })
            }
        };

        let status = match &outcome {
            Ok(_) => AttemptStatus::Success,
            Err(e) if e.is_cancelled() => AttemptStatus::Cancelled,
            Err(Error::BreakerOpen { .. }) => AttemptStatus::Rejected,
            Err(_) => AttemptStatus::Error,
        };
        self.metrics
            .observe_attempt(&self.provider, METHOD_GET_PRICE, status, start.elapsed());

        if let Err(e) = &outcome {
            if !e.is_cancelled() {
                self.metrics.record_error(&self.provider, e.error_type());
            }
        }

        outcome
    }

    fn publish_breaker_state(&self) {
        self.metrics
            .set_breaker_state(self.breaker.name(), self.breaker.state());
    }
}

#[async_trait]
impl PriceProvider for ResilientPriceClient {
    async fn get_price(&self, cancel: &CancellationToken, symbol: &str) -> Result<Price> {
        self.call(cancel, symbol).await
    }
}
