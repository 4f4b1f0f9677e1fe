//! Closed-form Black-Scholes pricing for European options

use tracing::debug;

use crate::error::Result;
use crate::instrument::{Instrument, OptionKind};
use crate::valuation::{check_volatility, OptionTerms, Valuation};

/// Black-Scholes pricer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackScholesPricer {
    /// Continuously compounded risk-free rate
    pub risk_free_rate: f64,
    /// Annualized volatility of the underlying
    pub volatility: f64,
}

impl BlackScholesPricer {
    /// Create a pricer
    pub fn new(risk_free_rate: f64, volatility: f64) -> Self {
        Self {
            risk_free_rate,
            volatility,
        }
    }

    /// Price a European option.
    ///
    /// An expired option is worth its intrinsic value at `valuation.spot`.
    pub fn price(&self, instrument: &dyn Instrument, valuation: &Valuation) -> Result<f64> {
        check_volatility(self.volatility)?;
        let terms = OptionTerms::resolve(instrument, valuation)?;

        if terms.years == 0.0 {
            return Ok(terms.intrinsic());
        }

        let r = self.risk_free_rate;
        let sigma = self.volatility;
        let sqrt_t = terms.years.sqrt();

        let d1 = ((terms.spot / terms.strike).ln() + (r + sigma * sigma / 2.0) * terms.years)
            / (sigma * sqrt_t);
        let d2 = d1 - sigma * sqrt_t;
        let discounted_strike = terms.strike * (-r * terms.years).exp();

        let value = match terms.kind {
            OptionKind::Call => terms.spot * norm_cdf(d1) - discounted_strike * norm_cdf(d2),
            OptionKind::Put => discounted_strike * norm_cdf(-d2) - terms.spot * norm_cdf(-d1),
        };

        debug!(instrument = %instrument.id(), d1 = d1, d2 = d2, value = value, "Black-Scholes price");
        Ok(value)
    }
}

/// Standard normal cumulative distribution
fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7)
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
