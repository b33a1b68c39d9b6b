use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::Signal;

/// One completed round trip. Fees are in quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Signal that opened the position.
    pub signal: Signal,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub fees: f64,
    /// `(exit_value - entry_value) - entry_fee - exit_fee`.
    pub pnl: f64,
    /// `pnl / entry_value`.
    pub pnl_pct: f64,
}

impl TradeResult {
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    pub fn exit_value(&self) -> f64 {
        self.exit_price * self.quantity
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub algorithm: String,
    pub pair: String,
    pub candles: usize,
    pub initial_capital: f64,
    /// Realized capital plus the marked-to-market value of any open position.
    pub final_equity: f64,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_fees: f64,
    /// Largest peak-to-trough decline of the equity curve, as a fraction in [0, 1].
    pub max_drawdown: f64,
    /// Mean over standard deviation of per-trade returns. Not annualized.
    pub sharpe_ratio: f64,
    /// A position still open after the last candle is not a trade.
    pub position_open_at_end: bool,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeResult>,
}
