//! `finguard serve-metrics`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use finguard_market::{PriceProvider, ResilientPriceClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Prometheus metrics endpoint
async fn metrics_endpoint() -> String {
    finguard_core::metrics_global::export_prometheus()
}

/// Create the metrics routes
pub fn metrics_routes() -> Router {
    Router::new().route("/metrics", get(metrics_endpoint))
}

pub async fn run(
    config: &AppConfig,
    cancel: CancellationToken,
    addr: SocketAddr,
    symbol: String,
    interval_ms: u64,
) -> anyhow::Result<()> {
    let client = Arc::new(super::build_client(config)?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Metrics server listening on http://{}/metrics", addr);

    let quotes = tokio::spawn(quote_loop(
        client,
        cancel.clone(),
        symbol,
        Duration::from_millis(interval_ms.max(1)),
    ));

    let shutdown = cancel.clone();
    let served = axum::serve(listener, metrics_routes())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server error");

    // Stop the quote loop whichever way the server ended
    cancel.cancel();
    if let Err(e) = quotes.await {
        warn!("Quote loop task error: {}", e);
    }

    served?;
    info!("Finguard shutdown complete");
    Ok(())
}

async fn quote_loop(
    provider: Arc<ResilientPriceClient>,
    cancel: CancellationToken,
    symbol: String,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match provider.get_price(&cancel, &symbol).await {
            Ok(price) => info!(symbol = %price.symbol, value = %price.value, "Price received"),
            Err(e) if e.is_cancelled() => break,
            Err(e) => warn!(symbol = %symbol, error = %e, "Failed to fetch price"),
        }
    }
}
