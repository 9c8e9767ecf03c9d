//! Provider abstraction for fetching coin data from external APIs

use crate::{error::TrackerError, types::Observation};
use async_trait::async_trait;

/// Trait for market price providers
///
/// Implementations must check for shutdown right before issuing a request and
/// fail with `TrackerError::ShutdownRequested` instead of calling out.
#[async_trait]
pub trait MarketPriceProvider: Send + Sync {
    /// Looks up the trading symbol for a coin identifier
    ///
    /// # Arguments
    /// * `coin` - Lower-cased provider identifier (e.g. "bitcoin")
    ///
    /// # Returns
    /// The upper-cased symbol, `NotFound` if the provider does not know the
    /// coin, or a transient error for anything else request-related
    async fn resolve_symbol(&self, coin: &str) -> Result<String, TrackerError>;

    /// Fetches the current USD price and its server-side update time
    async fn fetch_price(&self, coin: &str) -> Result<Observation, TrackerError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
