//! Finguard Pricing - Instruments, money and valuation models
//!
//! The collaborator protected by the resilience pipeline:
//! - `Instrument`, `Equity`, `EuropeanOption`: what gets priced
//! - `Money`: currency-checked decimal arithmetic
//! - `BlackScholesPricer`: closed-form European option values
//! - `MonteCarloPricer`: cancellable parallel GBM simulation
//! - `historical_var`: historical-simulation Value at Risk
//!
//! Pricers take the spot price through [`Valuation`]; fetching it is the
//! caller's job.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod black_scholes;
pub mod error;
pub mod instrument;
pub mod money;
pub mod monte_carlo;
pub mod valuation;
pub mod var;

pub use black_scholes::BlackScholesPricer;
pub use error::{Error, Result};
pub use instrument::{EuropeanOption, Equity, ExerciseStyle, Instrument, InstrumentKind, OptionKind};
pub use money::Money;
pub use monte_carlo::MonteCarloPricer;
pub use valuation::Valuation;
pub use var::historical_var;
