//! Price provider traits
//!
//! - `PriceSource`: the raw call into an upstream, no protection
//! - `PriceProvider`: what callers depend on, implemented by the resilient client

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SourceError};
use crate::price::Price;

/// Unprotected upstream price source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current price of `symbol`.
    ///
    /// Implementations should return [`SourceError::Cancelled`] promptly once
    /// `cancel` fires.
    async fn fetch_price(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> std::result::Result<Price, SourceError>;
}

/// Trait for price providers
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Get the current price of `symbol`
    async fn get_price(&self, cancel: &CancellationToken, symbol: &str) -> Result<Price>;
}
