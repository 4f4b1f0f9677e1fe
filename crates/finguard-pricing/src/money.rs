//! Currency-tagged decimal amounts

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An amount of money in one currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    /// Create an amount; the currency code is upper-cased
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_uppercase(),
        }
    }

    /// Parse a decimal string such as `"100.50"`
    pub fn from_str_amount(amount: &str, currency: &str) -> Result<Self> {
        let amount = Decimal::from_str(amount)
            .map_err(|e| Error::InvalidInput(format!("amount '{}': {}", amount, e)))?;
        Ok(Self::new(amount, currency))
    }

    /// Convert a float amount
    pub fn from_f64(amount: f64, currency: &str) -> Result<Self> {
        let amount = Decimal::try_from(amount)
            .map_err(|e| Error::InvalidInput(format!("amount {}: {}", amount, e)))?;
        Ok(Self::new(amount.normalize(), currency))
    }

    /// The amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency code
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Sum of two amounts in the same currency
    pub fn add(&self, other: &Money) -> Result<Money> {
        self.check_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| Error::InvalidInput("amount overflow".to_string()))?;
        Ok(Self::new(amount, &self.currency))
    }

    /// Difference of two amounts in the same currency
    pub fn sub(&self, other: &Money) -> Result<Money> {
        self.check_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| Error::InvalidInput("amount overflow".to_string()))?;
        Ok(Self::new(amount, &self.currency))
    }

    /// Scale by a factor
    pub fn mul(&self, scalar: Decimal) -> Result<Money> {
        let amount = self
            .amount
            .checked_mul(scalar)
            .ok_or_else(|| Error::InvalidInput("amount overflow".to_string()))?;
        Ok(Self::new(amount.normalize(), &self.currency))
    }

    /// Divide by a non-zero factor
    pub fn div(&self, scalar: Decimal) -> Result<Money> {
        let amount = self
            .amount
            .checked_div(scalar)
            .ok_or_else(|| Error::InvalidInput(format!("cannot divide by {}", scalar)))?;
        Ok(Self::new(amount.normalize(), &self.currency))
    }

    /// Whether the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Whether the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Whether the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    fn check_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(Error::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{:.2} {}", rounded, self.currency)
    }
}
