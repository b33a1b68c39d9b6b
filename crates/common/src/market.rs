use std::time::Duration;

use async_trait::async_trait;

use crate::{Candle, DateRange, Result};

/// Source of prices for live ticks and historical candles for backtests.
///
/// Implementations must tolerate being called on every tick; caching and
/// rate limiting are their responsibility.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// The most recent `lookback` close prices for `pair`, oldest first.
    async fn price_window(&self, pair: &str, lookback: usize) -> Result<Vec<f64>>;

    /// Latest price of `pair` from an independent second source, if one exists.
    async fn reference_price(&self, _pair: &str) -> Result<Option<f64>> {
        Ok(None)
    }

    /// Candles for `pair` at `interval` covering `range`, oldest first.
    async fn candles(&self, pair: &str, interval: Duration, range: &DateRange)
        -> Result<Vec<Candle>>;
}
