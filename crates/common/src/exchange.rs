use async_trait::async_trait;

use crate::{Fill, Order, Result};

/// Abstraction over one execution venue.
///
/// `BinanceClient` implements this for the centralized path and `DexClient`
/// for on-chain swaps. Only the `ExecutionRouter` in `crates/engine` calls
/// `place_order`; strategies never hold a venue directly.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Venue identifier this client serves, e.g. "binance".
    fn venue(&self) -> &str;

    /// Whether credentials and wallet configuration are present. Unconfigured
    /// venues are never sent real orders.
    fn is_configured(&self) -> bool;

    /// Submit an order and return the fill confirmation.
    async fn place_order(&self, order: &Order) -> Result<Fill>;
}
