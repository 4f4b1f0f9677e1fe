//! Finguard Market - Protected market data access
//!
//! This crate wraps an unreliable price source in the resilience pipeline
//! from `finguard-core`:
//! - `PriceSource` / `PriceProvider`: raw and protected price traits
//! - `SimulatedSource`: random latency and failures for demos and tests
//! - `ResilientPriceClient`: rate limiter, retry and circuit breaker in one call
//! - `ResilienceMetrics`: latency, error, rejection and breaker state metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod metrics;
pub mod price;
pub mod provider;
pub mod simulated;

pub use client::ResilientPriceClient;
pub use error::{Error, Result, SourceError, UserFriendlyError};
pub use metrics::{AttemptStatus, ResilienceMetrics};
pub use price::Price;
pub use provider::{PriceProvider, PriceSource};
pub use simulated::{SimulatedConfig, SimulatedSource};
