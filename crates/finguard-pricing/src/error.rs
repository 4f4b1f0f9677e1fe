//! Error types for finguard-pricing

use thiserror::Error;

/// Pricing error type
#[derive(Debug, Error)]
pub enum Error {
    /// The pricer cannot value this kind of instrument
    #[error("unsupported instrument '{id}' of kind {kind}")]
    UnsupportedInstrument {
        /// Instrument identifier
        id: String,
        /// Instrument kind
        kind: String,
    },

    /// A model input is out of range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Arithmetic between amounts in different currencies
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Left-hand currency
        left: String,
        /// Right-hand currency
        right: String,
    },

    /// The caller's cancellation token fired
    #[error("pricing cancelled")]
    Cancelled,

    /// A simulation worker failed
    #[error("simulation worker failed: {0}")]
    Task(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
