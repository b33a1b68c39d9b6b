use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use common::{Error, Execution, Order, Result, TradingMode, VenueClient};
use paper::PaperClient;

use crate::dex::is_dex_venue;

/// Which execution path a venue id selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueKind {
    Cex,
    Dex,
}

impl VenueKind {
    pub fn from_id(venue: &str) -> Self {
        if is_dex_venue(venue) {
            VenueKind::Dex
        } else {
            VenueKind::Cex
        }
    }
}

/// Turns an order into an `Execution`.
///
/// This is the only caller of `VenueClient::place_order`. Paper orders never
/// leave the process. Live orders to a venue without a configured client fall
/// back to a `Simulated` execution instead of failing.
pub struct ExecutionRouter {
    cex: HashMap<String, Arc<dyn VenueClient>>,
    dex: Option<Arc<dyn VenueClient>>,
    paper: PaperClient,
    call_timeout: Duration,
}

impl ExecutionRouter {
    pub fn new(paper: PaperClient, call_timeout: Duration) -> Self {
        Self {
            cex: HashMap::new(),
            dex: None,
            paper,
            call_timeout,
        }
    }

    /// Register a centralized venue under its own id.
    pub fn with_venue(mut self, client: Arc<dyn VenueClient>) -> Self {
        info!(venue = client.venue(), configured = client.is_configured(), "Venue registered");
        self.cex.insert(client.venue().to_lowercase(), client);
        self
    }

    /// The swap client shared by every DEX venue id.
    pub fn with_dex(mut self, client: Arc<dyn VenueClient>) -> Self {
        info!(configured = client.is_configured(), "DEX path registered");
        self.dex = Some(client);
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn client_for(&self, venue: &str) -> Option<&Arc<dyn VenueClient>> {
        match VenueKind::from_id(venue) {
            VenueKind::Dex => self.dex.as_ref(),
            VenueKind::Cex => self.cex.get(&venue.to_lowercase()),
        }
    }

    /// Execute `order` in `mode`. `last_price` prices paper and simulated fills.
    pub async fn route(&self, mode: TradingMode, order: &Order, last_price: f64) -> Result<Execution> {
        if mode == TradingMode::Paper {
            return Ok(Execution::Paper(self.paper.fill(order, last_price)));
        }

        let client = match self.client_for(&order.venue) {
            Some(client) if client.is_configured() => client,
            Some(_) => return Ok(self.simulate(order, last_price, "venue credentials not configured")),
            None => return Ok(self.simulate(order, last_price, "no client registered for venue")),
        };

        match tokio::time::timeout(self.call_timeout, client.place_order(order)).await {
            Ok(Ok(fill)) => Ok(Execution::Venue(fill)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout {
                operation: format!("{} place_order", order.venue),
                secs: self.call_timeout.as_secs(),
            }),
        }
    }

    fn simulate(&self, order: &Order, last_price: f64, reason: &str) -> Execution {
        warn!(venue = %order.venue, pair = %order.pair, reason, "Live order simulated");
        Execution::Simulated {
            fill: self.paper.fill(order, last_price),
            reason: format!("{}: {reason}", order.venue),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use common::{Fill, OrderSide};

    use super::*;

    struct StubVenue {
        id: &'static str,
        configured: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubVenue {
        fn new(id: &'static str, configured: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                configured,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VenueClient for StubVenue {
        fn venue(&self) -> &str {
            self.id
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn place_order(&self, order: &Order) -> Result<Fill> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Fill {
                order_id: format!("real-{}", order.id),
                venue: self.id.to_string(),
                pair: order.pair.clone(),
                side: order.side,
                fill_price: 101.0,
                quantity: order.quantity,
                timestamp: Utc::now(),
            })
        }
    }

    fn router() -> ExecutionRouter {
        ExecutionRouter::new(PaperClient::new(0.0), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn paper_mode_never_calls_the_venue() {
        let venue = StubVenue::new("binance", true);
        let router = router().with_venue(venue.clone());
        let order = Order::market("binance", "BTCUSDT", OrderSide::Buy, 1.0);
        let exec = router.route(TradingMode::Paper, &order, 100.0).await.unwrap();
        assert!(matches!(exec, Execution::Paper(ref f) if f.fill_price == 100.0));
        assert_eq!(venue.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn live_with_configured_venue_is_real() {
        let venue = StubVenue::new("binance", true);
        let router = router().with_venue(venue.clone());
        let order = Order::market("binance", "BTCUSDT", OrderSide::Buy, 1.0);
        let exec = router.route(TradingMode::Live, &order, 100.0).await.unwrap();
        assert!(exec.is_real());
        assert_eq!(exec.fill().fill_price, 101.0);
        assert_eq!(venue.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn live_without_configuration_is_labelled_simulated() {
        let router = router()
            .with_venue(StubVenue::new("binance", false))
            .with_dex(StubVenue::new("dex", false));
        for venue in ["binance", "uniswap", "kraken"] {
            let order = Order::market(venue, "ETHUSDT", OrderSide::Sell, 1.0);
            let exec = router.route(TradingMode::Live, &order, 50.0).await.unwrap();
            match exec {
                Execution::Simulated { fill, reason } => {
                    assert_eq!(fill.fill_price, 50.0);
                    assert!(reason.starts_with(venue));
                }
                other => panic!("expected simulated execution, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn dex_ids_share_the_swap_client() {
        let dex = StubVenue::new("dex", true);
        let router = router().with_dex(dex.clone());
        for venue in ["uniswap", "jupiter", "dex-sol"] {
            let order = Order::market(venue, "SOL/USDC", OrderSide::Buy, 1.0);
            assert!(router.route(TradingMode::Live, &order, 20.0).await.unwrap().is_real());
        }
        assert_eq!(dex.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_venue_times_out() {
        let venue = Arc::new(StubVenue {
            id: "binance",
            configured: true,
            delay: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
        });
        let router = router().with_venue(venue);
        let order = Order::market("binance", "BTCUSDT", OrderSide::Buy, 1.0);
        let err = router.route(TradingMode::Live, &order, 100.0).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { secs: 1, .. }));
        assert!(!err.is_fatal());
    }
}
