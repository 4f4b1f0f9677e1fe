//! Price quote type

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Ticker symbol
    pub symbol: String,
    /// Quoted value
    pub value: Decimal,
    /// When the quote was taken
    pub timestamp: DateTime<Utc>,
}

impl Price {
    /// Create a price stamped with the current time
    pub fn new(symbol: impl Into<String>, value: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            value,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} @ {}",
            self.symbol,
            self.value,
            self.timestamp.to_rfc3339()
        )
    }
}
