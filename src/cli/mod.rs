//! CLI module for Finguard
//!
//! Provides commands:
//! - `quote`: Fetch prices through the resilience pipeline
//! - `price`: Value a European option at the fetched spot
//! - `var`: Historical Value at Risk
//! - `serve-metrics`: Background quotes plus a Prometheus endpoint

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use finguard_market::{
    ResilienceMetrics, ResilientPriceClient, SimulatedSource, UserFriendlyError,
};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

pub mod price;
pub mod quote;
pub mod serve;
pub mod var;

/// Finguard CLI
#[derive(Parser, Debug)]
#[command(name = "finguard")]
#[command(about = "Resilient market data and option pricing")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch prices through the rate limiter, retry loop and circuit breaker
    Quote {
        /// Ticker symbol
        symbol: String,
        /// Number of quotes to fetch
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Price a European option on the current spot
    Price {
        /// Underlying ticker symbol
        symbol: String,
        /// Strike price
        #[arg(long)]
        strike: f64,
        /// Days to expiry
        #[arg(long)]
        days: u32,
        /// Price a put instead of a call
        #[arg(long)]
        put: bool,
        /// Monte Carlo paths (defaults to pricing.simulations)
        #[arg(long)]
        simulations: Option<u64>,
        /// Settlement currency
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    /// Historical-simulation Value at Risk
    Var {
        /// Confidence level, e.g. 0.95
        #[arg(long, default_value_t = 0.95)]
        confidence: f64,
        /// Portfolio value
        #[arg(long)]
        value: f64,
        /// Settlement currency
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Historical returns as fractions, e.g. -0.02 0.01
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        returns: Vec<f64>,
    },
    /// Fetch quotes in the background and expose /metrics
    ServeMetrics {
        /// Listen address (defaults to metrics.addr)
        #[arg(long)]
        addr: Option<SocketAddr>,
        /// Symbol to quote in the background
        #[arg(long, default_value = "AAPL")]
        symbol: String,
        /// Milliseconds between background quotes
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Quote { symbol, count }) => {
            quote::run(&config, &cancel, &symbol, count).await
        }
        Some(Commands::Price {
            symbol,
            strike,
            days,
            put,
            simulations,
            currency,
        }) => {
            let request = price::PriceRequest {
                symbol,
                strike,
                days,
                put,
                simulations,
                currency,
            };
            price::run(&config, &cancel, request).await
        }
        Some(Commands::Var {
            confidence,
            value,
            currency,
            returns,
        }) => var::run(confidence, value, &currency, &returns),
        Some(Commands::ServeMetrics {
            addr,
            symbol,
            interval_ms,
        }) => {
            let addr = addr.unwrap_or(config.metrics.addr);
            serve::run(&config, cancel, addr, symbol, interval_ms).await
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Build the resilient client over the simulated source, recording into
/// the global metrics registry
pub fn build_client(config: &AppConfig) -> anyhow::Result<ResilientPriceClient> {
    let source = Arc::new(SimulatedSource::new(config.market.simulated()));
    ResilientPriceClient::from_settings(
        config.market.provider.clone(),
        source,
        &config.resilience,
        ResilienceMetrics::global(),
    )
    .context("Failed to build price client")
}

/// Print a pipeline error with its suggestion
pub fn report_error(error: &finguard_market::Error) {
    eprintln!("{}", error.user_message());
    if let Some(suggestion) = error.suggestion() {
        eprintln!("   💡 {}", suggestion);
    }
}
