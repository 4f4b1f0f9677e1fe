//! Market inputs shared by the option pricers

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::error::{Error, Result};
use crate::instrument::{Instrument, OptionKind};

/// Spot price and valuation time for one pricing run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    /// Current price of the underlying
    pub spot: f64,
    /// Instant the option is valued at
    pub as_of: DateTime<Utc>,
}

impl Valuation {
    /// Value at `spot` as of now
    pub fn new(spot: f64) -> Self {
        Self::at(spot, Utc::now())
    }

    /// Value at `spot` as of `as_of`
    pub fn at(spot: f64, as_of: DateTime<Utc>) -> Self {
        Self { spot, as_of }
    }
}

/// Option terms in the float form the models work with
#[derive(Debug, Clone, Copy)]
pub(crate) struct OptionTerms {
    pub kind: OptionKind,
    pub spot: f64,
    pub strike: f64,
    /// Years to expiry, clamped at zero
    pub years: f64,
}

impl OptionTerms {
    /// Extract and validate the terms of a European option
    pub fn resolve(instrument: &dyn Instrument, valuation: &Valuation) -> Result<Self> {
        let option = instrument
            .as_european_option()
            .ok_or_else(|| Error::UnsupportedInstrument {
                id: instrument.id().to_string(),
                kind: instrument.kind().to_string(),
            })?;

        if !valuation.spot.is_finite() || valuation.spot <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "spot must be positive, got {}",
                valuation.spot
            )));
        }

        let strike = option
            .strike()
            .to_f64()
            .filter(|k| k.is_finite() && *k > 0.0)
            .ok_or_else(|| {
                Error::InvalidInput(format!("strike must be positive, got {}", option.strike()))
            })?;

        Ok(Self {
            kind: option.option_kind(),
            spot: valuation.spot,
            strike,
            years: option.years_to_expiry(valuation.as_of).max(0.0),
        })
    }

    /// Payoff if exercised at the current spot
    pub fn intrinsic(&self) -> f64 {
        self.kind.payoff(self.spot, self.strike)
    }
}

/// Reject a non-positive or non-finite volatility
pub(crate) fn check_volatility(volatility: f64) -> Result<()> {
    if !volatility.is_finite() || volatility <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "volatility must be positive, got {}",
            volatility
        )));
    }
    Ok(())
}
