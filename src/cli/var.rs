//! `finguard var`

use finguard_pricing::{historical_var, Money};

pub fn run(confidence: f64, value: f64, currency: &str, returns: &[f64]) -> anyhow::Result<()> {
    if !(0.0..1.0).contains(&confidence) {
        anyhow::bail!("confidence must be in [0, 1), got {}", confidence);
    }

    let var = historical_var(returns, confidence, value);
    println!(
        "📉 VaR {:.1}% over {} returns: {}",
        confidence * 100.0,
        returns.len(),
        Money::from_f64(var, currency)?
    );
    Ok(())
}
