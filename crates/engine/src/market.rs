use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use common::{Candle, DateRange, MarketDataProvider, Result};

/// Primary feed plus an independent second source for the same pairs.
///
/// Windows and candles come from the primary. The secondary's latest close
/// is the reference price arbitrage compares against.
pub struct DualSourceMarket {
    primary: Arc<dyn MarketDataProvider>,
    secondary: Arc<dyn MarketDataProvider>,
}

impl DualSourceMarket {
    pub fn new(primary: Arc<dyn MarketDataProvider>, secondary: Arc<dyn MarketDataProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl MarketDataProvider for DualSourceMarket {
    async fn price_window(&self, pair: &str, lookback: usize) -> Result<Vec<f64>> {
        self.primary.price_window(pair, lookback).await
    }

    async fn reference_price(&self, pair: &str) -> Result<Option<f64>> {
        let window = self.secondary.price_window(pair, 1).await?;
        let latest = window.last().copied();
        debug!(%pair, reference = ?latest, "Reference price fetched");
        Ok(latest)
    }

    async fn candles(
        &self,
        pair: &str,
        interval: Duration,
        range: &DateRange,
    ) -> Result<Vec<Candle>> {
        self.primary.candles(pair, interval, range).await
    }
}
