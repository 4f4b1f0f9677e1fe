//! Financial instruments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broad instrument category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentKind {
    /// Listed share
    Equity,
    /// Fixed income
    Bond,
    /// Derivative option contract
    Option,
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentKind::Equity => write!(f, "EQUITY"),
            InstrumentKind::Bond => write!(f, "BOND"),
            InstrumentKind::Option => write!(f, "OPTION"),
        }
    }
}

/// Anything that can be priced
pub trait Instrument: Send + Sync {
    /// Unique identifier
    fn id(&self) -> &str;

    /// Instrument category
    fn kind(&self) -> InstrumentKind;

    /// Settlement currency
    fn currency(&self) -> &str;

    /// The instrument as a European option, if it is one
    fn as_european_option(&self) -> Option<&EuropeanOption> {
        None
    }
}

/// A listed share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equity {
    id: String,
    currency: String,
    symbol: String,
}

impl Equity {
    /// Create an equity
    pub fn new(
        id: impl Into<String>,
        currency: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            currency: currency.into(),
            symbol: symbol.into(),
        }
    }

    /// Ticker symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Instrument for Equity {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Equity
    }

    fn currency(&self) -> &str {
        &self.currency
    }
}

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionKind {
    /// Right to buy
    Call,
    /// Right to sell
    Put,
}

impl OptionKind {
    /// Payoff at expiry for terminal price `spot`
    pub fn payoff(self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionKind::Call => (spot - strike).max(0.0),
            OptionKind::Put => (strike - spot).max(0.0),
        }
    }
}

/// When the option may be exercised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseStyle {
    /// Only at expiry
    European,
    /// Any time up to expiry
    American,
}

/// An option that can only be exercised at expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EuropeanOption {
    id: String,
    underlying: Equity,
    strike: Decimal,
    expiry: DateTime<Utc>,
    option_kind: OptionKind,
}

impl EuropeanOption {
    /// Create a European option on `underlying`
    pub fn new(
        id: impl Into<String>,
        underlying: Equity,
        strike: Decimal,
        expiry: DateTime<Utc>,
        option_kind: OptionKind,
    ) -> Self {
        Self {
            id: id.into(),
            underlying,
            strike,
            expiry,
            option_kind,
        }
    }

    /// The underlying equity
    pub fn underlying(&self) -> &Equity {
        &self.underlying
    }

    /// Strike price
    pub fn strike(&self) -> Decimal {
        self.strike
    }

    /// Expiry instant
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Call or put
    pub fn option_kind(&self) -> OptionKind {
        self.option_kind
    }

    /// Always [`ExerciseStyle::European`]
    pub fn style(&self) -> ExerciseStyle {
        ExerciseStyle::European
    }

    /// Years from `now` to expiry on an ACT/365 basis, negative once expired
    pub fn years_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (self.expiry - now).num_milliseconds() as f64 / 1_000.0;
        seconds / (365.0 * 24.0 * 3600.0)
    }
}

impl Instrument for EuropeanOption {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Option
    }

    fn currency(&self) -> &str {
        self.underlying.currency()
    }

    fn as_european_option(&self) -> Option<&EuropeanOption> {
        Some(self)
    }
}
