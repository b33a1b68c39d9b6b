use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::debug;

use common::{Fill, Order, OrderSide};

/// Simulated fills for paper trading.
///
/// Fills happen immediately at the caller's reference price with configurable
/// slippage. No order ever leaves the process.
pub struct PaperClient {
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
    fills: AtomicU64,
}

impl PaperClient {
    pub fn new(slippage_bps: f64) -> Self {
        Self {
            slippage_bps,
            fills: AtomicU64::new(0),
        }
    }

    /// Fill `order` against `reference_price`. Limit orders fill at their
    /// limit price.
    pub fn fill(&self, order: &Order, reference_price: f64) -> Fill {
        let mid_price = order.price.unwrap_or(reference_price);

        // Apply slippage: buys pay more, sells receive less
        let fill_price = match order.side {
            OrderSide::Buy => mid_price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => mid_price * (1.0 - self.slippage_bps / 10_000.0),
        };

        debug!(
            pair = %order.pair,
            side = %order.side,
            mid = mid_price,
            fill = fill_price,
            qty = order.quantity,
            "Paper fill simulated"
        );
        self.fills.fetch_add(1, Ordering::Relaxed);

        Fill {
            order_id: order.id.clone(),
            venue: order.venue.clone(),
            pair: order.pair.clone(),
            side: order.side,
            fill_price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        }
    }

    /// Number of fills simulated so far.
    pub fn fill_count(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    pub fn slippage_bps(&self) -> f64 {
        self.slippage_bps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_buy_fill_applies_positive_slippage() {
        let client = PaperClient::new(10.0); // 10 bps
        let order = Order::market("binance", "BTCUSDT", OrderSide::Buy, 0.01);
        let fill = client.fill(&order, 1000.0);

        let expected = 1000.0 * (1.0 + 10.0 / 10_000.0);
        assert!(
            (fill.fill_price - expected).abs() < 1e-6,
            "Buy fill price {}, expected {}",
            fill.fill_price,
            expected
        );
    }

    #[test]
    fn paper_sell_fill_applies_negative_slippage() {
        let client = PaperClient::new(10.0);
        let order = Order::market("binance", "BTCUSDT", OrderSide::Sell, 0.01);
        let fill = client.fill(&order, 1000.0);

        let expected = 1000.0 * (1.0 - 10.0 / 10_000.0);
        assert!((fill.fill_price - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_slippage_fills_at_reference() {
        let client = PaperClient::new(0.0);
        let order = Order::market("uniswap", "ETH/USDC", OrderSide::Buy, 2.0);
        let fill = client.fill(&order, 2500.0);
        assert_eq!(fill.fill_price, 2500.0);
        assert_eq!(fill.quantity, 2.0);
        assert_eq!(fill.order_id, order.id);
        assert_eq!(fill.venue, "uniswap");
        assert_eq!(client.fill_count(), 1);
    }

    #[test]
    fn limit_order_fills_at_limit_price() {
        let client = PaperClient::new(0.0);
        let order = Order::limit("binance", "BTCUSDT", OrderSide::Buy, 1.0, 990.0);
        assert_eq!(client.fill(&order, 1000.0).fill_price, 990.0);
    }
}
