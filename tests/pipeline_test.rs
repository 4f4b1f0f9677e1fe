//! Integration tests for the resilience pipeline
//!
//! These tests drive `ResilientPriceClient` end to end through the public
//! crate APIs, with scripted price sources and a paused clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use finguard_core::{
    BackoffConfig, CancellationToken, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    MetricsRegistry, RateLimitConfig, RateLimiter, ResilienceSettings,
};
use finguard_market::{
    Error, Price, PriceProvider, PriceSource, ResilienceMetrics, ResilientPriceClient,
    SimulatedConfig, SimulatedSource, SourceError,
};
use rust_decimal::Decimal;
use tokio::time::Instant;

/// Replays a fixed list of outcomes, then keeps succeeding
struct ScriptedSource {
    script: Mutex<VecDeque<bool>>,
    calls: AtomicU32,
}

impl ScriptedSource {
    fn new(script: &[bool]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch_price(
        &self,
        _cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Price, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.script.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(Price::new(symbol, Decimal::new(10_125, 2)))
        } else {
            Err(SourceError::Network("simulated network error 500".to_string()))
        }
    }
}

fn no_jitter() -> BackoffConfig {
    BackoffConfig::new()
        .with_max_retries(3)
        .with_base_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_jitter(false)
}

fn pipeline(
    source: Arc<dyn PriceSource>,
    breaker_timeout: Duration,
    backoff: BackoffConfig,
) -> ResilientPriceClient {
    let metrics = ResilienceMetrics::new(&MetricsRegistry::new());
    let breaker = CircuitBreaker::new(
        "market-api",
        CircuitBreakerConfig::new().with_timeout(breaker_timeout),
    )
    .with_state_change_hook(metrics.state_change_hook());

    ResilientPriceClient::new(
        "scripted",
        source,
        Arc::new(RateLimiter::new(RateLimitConfig::new(10.0, 1))),
        Arc::new(breaker),
        backoff,
    )
    .with_metrics(metrics)
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds() {
    let source = Arc::new(ScriptedSource::new(&[false, false, true]));
    let client = pipeline(source.clone(), Duration::from_secs(5), no_jitter());
    let cancel = CancellationToken::new();

    let price = tokio_test::assert_ok!(client.call(&cancel, "AAPL").await);

    assert_eq!(price.symbol, "AAPL");
    assert_eq!(source.calls(), 3);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    let counts = client.breaker().counts();
    assert_eq!(counts.requests, 3);
    assert_eq!(counts.total_failures, 2);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_timeout() {
    let source = Arc::new(ScriptedSource::new(&[false, false, false]));
    let client = pipeline(
        source.clone(),
        Duration::from_secs(5),
        no_jitter().with_max_retries(2),
    );
    let cancel = CancellationToken::new();

    let err = client.call(&cancel, "AAPL").await.unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    assert_eq!(client.breaker().state(), CircuitState::Open);

    // Rejected without touching the source while open
    let err = client.call(&cancel, "AAPL").await.unwrap_err();
    assert_eq!(err.error_type(), "circuit_open");
    assert_eq!(source.calls(), 3);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(client.breaker().state(), CircuitState::HalfOpen);

    // The trial succeeds and closes the circuit with fresh counts
    client.call(&cancel, "AAPL").await.unwrap();
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(client.breaker().counts().requests, 0);

    let exported = client.metrics().registry().export_prometheus();
    assert!(exported.contains("finguard_circuit_breaker_state{name=\"market-api\"} 0"));
}

#[tokio::test(start_paused = true)]
async fn test_clients_share_limiter_and_breaker() {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(10.0, 2)));
    let breaker = Arc::new(CircuitBreaker::with_defaults("shared"));
    let source: Arc<dyn PriceSource> = Arc::new(ScriptedSource::new(&[]));

    let clients: Vec<Arc<ResilientPriceClient>> = (0..4)
        .map(|_| {
            Arc::new(ResilientPriceClient::new(
                "scripted",
                source.clone(),
                limiter.clone(),
                breaker.clone(),
                no_jitter(),
            ))
        })
        .collect();

    let cancel = CancellationToken::new();
    let start = Instant::now();
    let handles: Vec<_> = clients
        .iter()
        .cloned()
        .map(|client| {
            let cancel = cancel.clone();
            tokio::spawn(async move { client.call(&cancel, "MSFT").await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Burst of two, then one token every 100ms
    assert!(start.elapsed() >= Duration::from_millis(199));
    assert_eq!(breaker.counts().requests, 4);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_in_flight_call() {
    let source: Arc<dyn PriceSource> = Arc::new(SimulatedSource::new(
        SimulatedConfig::new()
            .with_failure_probability(1.0)
            .with_seed(5),
    ));
    let client = pipeline(source, Duration::from_secs(5), no_jitter());

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        canceller.cancel();
    });

    let err = tokio_test::assert_err!(client.get_price(&cancel, "AAPL").await);
    assert!(err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_client_from_default_settings() {
    let source: Arc<dyn PriceSource> = Arc::new(SimulatedSource::new(
        SimulatedConfig::new()
            .with_failure_probability(0.0)
            .with_seed(11),
    ));
    let client = ResilientPriceClient::from_settings(
        "simulated",
        source,
        &ResilienceSettings::default(),
        ResilienceMetrics::new(&MetricsRegistry::new()),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let price = client.call(&cancel, "AAPL").await.unwrap();
    assert!(price.value >= Decimal::new(100, 0));
    assert!(price.value < Decimal::new(150, 0));
}
