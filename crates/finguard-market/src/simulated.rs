//! Simulated market data source
//!
//! Stands in for a real exchange API: random latency, random failures,
//! prices uniformly distributed in `[100, 150)`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SourceError;
use crate::price::Price;
use crate::provider::PriceSource;

/// Lowest simulated price, in cents
const PRICE_FLOOR_CENTS: i64 = 10_000;
/// Width of the simulated price range, in cents
const PRICE_SPAN_CENTS: i64 = 5_000;

/// Configuration for [`SimulatedSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedConfig {
    /// Latency is drawn from `[0, max_latency)`
    pub max_latency: Duration,
    /// Probability that a call fails, clamped to `[0, 1]`
    pub failure_probability: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            max_latency: Duration::from_millis(100),
            failure_probability: 0.2,
            seed: None,
        }
    }
}

impl SimulatedConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latency upper bound
    #[must_use]
    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }

    /// Set the failure probability
    #[must_use]
    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability;
        self
    }

    /// Seed the RNG
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A price source that simulates network behavior
#[derive(Debug)]
pub struct SimulatedSource {
    max_latency: Duration,
    failure_probability: f64,
    rng: Mutex<StdRng>,
}

/// One call's worth of random draws
struct Draw {
    latency: Duration,
    fail: bool,
    cents: i64,
}

impl SimulatedSource {
    /// Create a new simulated source
    pub fn new(config: SimulatedConfig) -> Self {
        let failure_probability = if config.failure_probability.is_nan() {
            0.0
        } else {
            config.failure_probability.clamp(0.0, 1.0)
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            max_latency: config.max_latency,
            failure_probability,
            rng: Mutex::new(rng),
        }
    }

    fn draw(&self) -> Draw {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let max_nanos = u64::try_from(self.max_latency.as_nanos()).unwrap_or(u64::MAX);
        let latency = if max_nanos == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(rng.gen_range(0..max_nanos))
        };
        Draw {
            latency,
            fail: rng.gen_bool(self.failure_probability),
            cents: PRICE_FLOOR_CENTS + rng.gen_range(0..PRICE_SPAN_CENTS),
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

#[async_trait]
impl PriceSource for SimulatedSource {
    async fn fetch_price(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Price, SourceError> {
        let draw = self.draw();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            _ = tokio::time::sleep(draw.latency) => {}
        }

        if draw.fail {
            debug!(symbol = %symbol, "Simulated source failure");
            return Err(SourceError::Network("simulated network error 500".to_string()));
        }

        Ok(Price::new(symbol, Decimal::new(draw.cents, 2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(failure_probability: f64) -> SimulatedSource {
        SimulatedSource::new(
            SimulatedConfig::new()
                .with_failure_probability(failure_probability)
                .with_seed(42),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_prices_in_range_with_two_decimals() {
        let source = source(0.0);
        let cancel = CancellationToken::new();
        for _ in 0..50 {
            let price = source.fetch_price(&cancel, "AAPL").await.unwrap();
            assert_eq!(price.symbol, "AAPL");
            assert!(price.value >= Decimal::new(100, 0));
            assert!(price.value < Decimal::new(150, 0));
            assert!(price.value.scale() <= 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_source() {
        let source = source(1.0);
        let cancel = CancellationToken::new();
        let err = source.fetch_price(&cancel, "AAPL").await.unwrap_err();
        assert_eq!(err.to_string(), "simulated network error 500");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_below_max() {
        let source = SimulatedSource::new(
            SimulatedConfig::new()
                .with_failure_probability(0.0)
                .with_max_latency(Duration::from_millis(50))
                .with_seed(7),
        );
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        source.fetch_price(&cancel, "MSFT").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_latency() {
        let source = SimulatedSource::new(
            SimulatedConfig::new()
                .with_failure_probability(0.0)
                .with_max_latency(Duration::from_secs(3600))
                .with_seed(1),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = source.fetch_price(&cancel, "AAPL").await.unwrap_err();
        assert_eq!(err, SourceError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_prices() {
        let cancel = CancellationToken::new();
        let a = source(0.0).fetch_price(&cancel, "X").await.unwrap();
        let b = source(0.0).fetch_price(&cancel, "X").await.unwrap();
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_probability_clamped() {
        let source = source(7.5);
        assert_eq!(source.failure_probability, 1.0);
        let source = SimulatedSource::new(SimulatedConfig::new().with_failure_probability(f64::NAN));
        assert_eq!(source.failure_probability, 0.0);
    }
}
