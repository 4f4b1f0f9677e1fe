//! `finguard price`

use anyhow::{anyhow, Context};
use chrono::{Duration, Utc};
use finguard_pricing::{
    BlackScholesPricer, Equity, EuropeanOption, Money, MonteCarloPricer, OptionKind, Valuation,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;

/// Arguments of the `price` command
#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub symbol: String,
    pub strike: f64,
    pub days: u32,
    pub put: bool,
    pub simulations: Option<u64>,
    pub currency: String,
}

pub async fn run(
    config: &AppConfig,
    cancel: &CancellationToken,
    request: PriceRequest,
) -> anyhow::Result<()> {
    let client = super::build_client(config)?;

    let quote = match client.call(cancel, &request.symbol).await {
        Ok(quote) => quote,
        Err(e) => {
            super::report_error(&e);
            return Err(anyhow!(e)).context("Failed to fetch spot price");
        }
    };
    let spot = quote
        .value
        .to_f64()
        .ok_or_else(|| anyhow!("spot {} is not representable", quote.value))?;
    println!("📈 {}", quote);

    let strike = Decimal::try_from(request.strike).context("Invalid strike")?;
    let kind = if request.put {
        OptionKind::Put
    } else {
        OptionKind::Call
    };
    let now = Utc::now();
    let option = EuropeanOption::new(
        format!("{}-{:?}-{}", request.symbol, kind, strike).to_uppercase(),
        Equity::new(&request.symbol, &request.currency, &request.symbol),
        strike,
        now + Duration::days(i64::from(request.days)),
        kind,
    );
    let valuation = Valuation::at(spot, now);

    let pricing = &config.pricing;
    let closed_form = BlackScholesPricer::new(pricing.risk_free_rate, pricing.volatility)
        .price(&option, &valuation)
        .context("Black-Scholes pricing failed")?;
    println!(
        "🧮 Black-Scholes: {}",
        Money::from_f64(closed_form, &request.currency)?
    );

    let simulations = request.simulations.unwrap_or(pricing.simulations);
    let started = Instant::now();
    let simulated = MonteCarloPricer::new(simulations, pricing.risk_free_rate, pricing.volatility)
        .with_workers(pricing.workers)
        .price(cancel, &option, &valuation)
        .await
        .context("Monte Carlo pricing failed")?;
    info!(
        simulations = simulations,
        duration_secs = started.elapsed().as_secs_f64(),
        "Monte Carlo simulation completed"
    );
    println!(
        "🎲 Monte Carlo ({} paths): {}",
        simulations,
        Money::from_f64(simulated, &request.currency)?
    );

    Ok(())
}
