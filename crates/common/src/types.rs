use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Durable identifier assigned by the definition store.
pub type StrategyId = i64;

/// Open, algorithm-specific parameter map (grid bounds, periods, thresholds).
pub type Params = BTreeMap<String, serde_json::Value>;

/// Trade decision produced once per evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// The order side this signal trades on, `None` for `Hold`.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Signal::Buy => Some(OrderSide::Buy),
            Signal::Sell => Some(OrderSide::Sell),
            Signal::Hold => None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// An order routed to a venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub venue: String,
    pub pair: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    /// Limit price; `None` for market orders.
    pub price: Option<f64>,
}

impl Order {
    pub fn market(
        venue: impl Into<String>,
        pair: impl Into<String>,
        side: OrderSide,
        quantity: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            venue: venue.into(),
            pair: pair.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            price: None,
        }
    }

    pub fn limit(
        venue: impl Into<String>,
        pair: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(venue, pair, side, quantity)
        }
    }
}

/// Confirmation of a filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub venue: String,
    pub pair: String,
    pub side: OrderSide,
    pub fill_price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

/// How an order was actually executed.
///
/// A `Simulated` execution happens when live trading was requested but the
/// venue is not configured. It is never a real fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Execution {
    Venue(Fill),
    Paper(Fill),
    Simulated { fill: Fill, reason: String },
}

impl Execution {
    pub fn fill(&self) -> &Fill {
        match self {
            Execution::Venue(fill) | Execution::Paper(fill) => fill,
            Execution::Simulated { fill, .. } => fill,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Execution::Venue(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Execution::Venue(_) => "venue",
            Execution::Paper(_) => "paper",
            Execution::Simulated { .. } => "simulated",
        }
    }
}

/// Whether a strategy trades against a real venue or simulates locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    #[default]
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Lifecycle state of a strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Stopped,
    Running,
    Error,
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyStatus::Stopped => write!(f, "stopped"),
            StrategyStatus::Running => write!(f, "running"),
            StrategyStatus::Error => write!(f, "error"),
        }
    }
}

/// Running round-trip statistics of a strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceCounters {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub pnl: f64,
}

impl PerformanceCounters {
    /// Record one completed round-trip. Break-even trades count as losses.
    pub fn record(&mut self, pnl: f64) {
        self.total_trades += 1;
        if pnl > 0.0 {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.pnl += pnl;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.wins as f64 / self.total_trades as f64
    }
}

/// One OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(Error::Config(format!(
                "date range start {} must be before end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// The price history handed to a signal algorithm on one tick.
#[derive(Debug, Clone, Copy)]
pub struct PriceWindow<'a> {
    /// Close prices, oldest first.
    pub closes: &'a [f64],
    /// Latest price of the same instrument from an independent source.
    pub reference: Option<f64>,
}

impl<'a> PriceWindow<'a> {
    pub fn new(closes: &'a [f64]) -> Self {
        Self { closes, reference: None }
    }

    pub fn with_reference(closes: &'a [f64], reference: Option<f64>) -> Self {
        Self { closes, reference }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

fn default_poll_interval_ms() -> u64 {
    60_000
}

fn default_capital() -> f64 {
    1_000.0
}

fn default_venue() -> String {
    "binance".to_string()
}

/// Caller-supplied strategy configuration, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDraft {
    /// Human-readable name shown in logs and listings.
    pub name: String,
    /// Trading pair, e.g. "BTCUSDT".
    pub pair: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_capital")]
    pub capital: f64,
    #[serde(default)]
    pub mode: TradingMode,
    #[serde(default = "default_venue")]
    pub venue: String,
    #[serde(default)]
    pub params: Params,
}

impl StrategyDraft {
    pub fn new(name: impl Into<String>, pair: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pair: pair.into(),
            poll_interval_ms: default_poll_interval_ms(),
            capital: default_capital(),
            mode: TradingMode::Paper,
            venue: default_venue(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Checks the fields every algorithm relies on.
    pub fn validate(&self) -> Result<()> {
        if self.pair.trim().is_empty() {
            return Err(Error::invalid_param("pair", "must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::invalid_param("poll_interval_ms", "must be > 0"));
        }
        if !self.capital.is_finite() || self.capital <= 0.0 {
            return Err(Error::invalid_param("capital", "must be a positive number"));
        }
        if self.venue.trim().is_empty() {
            return Err(Error::invalid_param("venue", "must not be empty"));
        }
        Ok(())
    }
}

/// Immutable per-instance configuration. Parameter changes need a new instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: StrategyId,
    pub name: String,
    pub pair: String,
    pub poll_interval_ms: u64,
    pub capital: f64,
    pub mode: TradingMode,
    pub venue: String,
    pub params: Params,
}

impl StrategyConfig {
    pub fn new(id: StrategyId, draft: StrategyDraft) -> Self {
        Self {
            id,
            name: draft.name,
            pair: draft.pair,
            poll_interval_ms: draft.poll_interval_ms,
            capital: draft.capital,
            mode: draft.mode,
            venue: draft.venue,
            params: draft.params,
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

/// A persisted strategy definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: StrategyId,
    pub algorithm: String,
    pub draft: StrategyDraft,
    pub active: bool,
}

/// Point-in-time view of one registered instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySnapshot {
    pub id: StrategyId,
    pub name: String,
    pub algorithm: String,
    pub pair: String,
    pub mode: TradingMode,
    pub venue: String,
    pub status: StrategyStatus,
    pub performance: PerformanceSummary,
    pub position_open: bool,
    pub tick_errors: u64,
}

/// Counters plus the derived win rate, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub pnl: f64,
    pub win_rate: f64,
}

impl From<PerformanceCounters> for PerformanceSummary {
    fn from(c: PerformanceCounters) -> Self {
        Self {
            total_trades: c.total_trades,
            wins: c.wins,
            losses: c.losses,
            pnl: c.pnl,
            win_rate: c.win_rate(),
        }
    }
}

const QUOTE_ASSETS: [&str; 7] = ["USDT", "USDC", "BUSD", "FDUSD", "USD", "BTC", "ETH"];

/// Split a pair into `(base, quote)`.
///
/// Accepts "ETH/USDC", "ETH-USDC", "ETH_USDC" and concatenated symbols such as
/// "ETHUSDT" whose quote is a well-known asset.
pub fn split_pair(pair: &str) -> Option<(String, String)> {
    if let Some((base, quote)) = pair.split_once(&['/', '-', '_'][..]) {
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        return Some((base.to_uppercase(), quote.to_uppercase()));
    }
    let upper = pair.to_uppercase();
    QUOTE_ASSETS.iter().find_map(|quote| {
        upper
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| (base.to_string(), quote.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_is_zero_without_trades() {
        let counters = PerformanceCounters::default();
        assert_eq!(counters.win_rate(), 0.0);
    }

    #[test]
    fn win_rate_tracks_wins_over_total() {
        let mut counters = PerformanceCounters::default();
        counters.record(12.5);
        counters.record(-3.0);
        counters.record(0.0);
        counters.record(1.0);
        assert_eq!(counters.total_trades, 4);
        assert_eq!(counters.wins, 2);
        assert_eq!(counters.losses, 2);
        assert_eq!(counters.win_rate(), 0.5);
        assert!((counters.pnl - 10.5).abs() < 1e-12);
    }

    #[test]
    fn simulated_execution_is_not_real() {
        let fill = Fill {
            order_id: "o1".into(),
            venue: "binance".into(),
            pair: "BTCUSDT".into(),
            side: OrderSide::Buy,
            fill_price: 100.0,
            quantity: 1.0,
            timestamp: Utc::now(),
        };
        let simulated = Execution::Simulated {
            fill: fill.clone(),
            reason: "no credentials".into(),
        };
        assert!(!simulated.is_real());
        assert!(!Execution::Paper(fill.clone()).is_real());
        assert!(Execution::Venue(fill).is_real());
        assert_eq!(simulated.label(), "simulated");
    }

    #[test]
    fn split_pair_handles_separators_and_suffixes() {
        assert_eq!(split_pair("eth/usdc"), Some(("ETH".into(), "USDC".into())));
        assert_eq!(split_pair("SOL-USDT"), Some(("SOL".into(), "USDT".into())));
        assert_eq!(split_pair("BTCUSDT"), Some(("BTC".into(), "USDT".into())));
        assert_eq!(split_pair("USDT"), None);
        assert_eq!(split_pair("FOO"), None);
    }

    #[test]
    fn draft_defaults_apply_when_deserializing() {
        let draft: StrategyDraft =
            serde_json::from_str(r#"{"name":"n","pair":"BTCUSDT"}"#).unwrap();
        assert_eq!(draft.mode, TradingMode::Paper);
        assert_eq!(draft.poll_interval_ms, 60_000);
        assert_eq!(draft.venue, "binance");
        assert!(draft.params.is_empty());
        draft.validate().unwrap();
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        assert!(DateRange::new(now, now - chrono::Duration::hours(1)).is_err());
        assert!(DateRange::new(now - chrono::Duration::hours(1), now).is_ok());
    }
}
