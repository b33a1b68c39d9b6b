use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use common::{Candle, Error, MarketDataProvider, PriceWindow, Result, Signal};
use strategy::Strategy;

use crate::config::BacktestConfig;
use crate::metrics::{max_drawdown, sharpe_ratio};
use crate::report::{BacktestReport, EquityPoint, TradeResult};

struct OpenTrade {
    entry_time: DateTime<Utc>,
    entry_price: f64,
    quantity: f64,
    entry_fee: f64,
    signal: Signal,
}

impl OpenTrade {
    fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }
}

pub struct BacktestEngine {
    market: Arc<dyn MarketDataProvider>,
}

impl BacktestEngine {
    pub fn new(market: Arc<dyn MarketDataProvider>) -> Self {
        Self { market }
    }

    /// Load candles for the configured range, then replay them.
    pub async fn run(&self, config: &BacktestConfig) -> Result<BacktestReport> {
        config.validate()?;
        let candles = self
            .market
            .candles(&config.pair, config.interval(), &config.range)
            .await?;
        info!(
            pair = %config.pair,
            algorithm = %config.algorithm,
            candles = candles.len(),
            "Backtest started"
        );
        // Replay is CPU-bound; keep it off the async workers.
        let replay_config = config.clone();
        let report = tokio::task::spawn_blocking(move || Self::replay(&replay_config, &candles))
            .await
            .map_err(|e| Error::Other(format!("backtest replay task failed: {e}")))??;
        info!(
            pair = %config.pair,
            trades = report.total_trades,
            pnl = report.total_pnl,
            max_drawdown = report.max_drawdown,
            "Backtest finished"
        );
        Ok(report)
    }

    /// Single ordered pass over `candles` with a fresh algorithm.
    ///
    /// Each step sees the same window a live tick would fetch: the last
    /// `window_len()` closes, fewer while the series is still short.
    /// Pure: identical config and candles give an identical report.
    pub fn replay(config: &BacktestConfig, candles: &[Candle]) -> Result<BacktestReport> {
        let mut algorithm = config.validate()?;
        let warm_up = algorithm.min_lookback();
        let window_len = algorithm.window_len().max(warm_up);

        let mut closes: Vec<f64> = Vec::with_capacity(candles.len());
        let mut capital = config.initial_capital;
        let mut open: Option<OpenTrade> = None;
        let mut trades: Vec<TradeResult> = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len());

        for (i, candle) in candles.iter().enumerate() {
            let price = candle.close;
            if !price.is_finite() || price <= 0.0 {
                return Err(Error::Invariant(format!(
                    "candle {i} at {} has close {price}",
                    candle.timestamp
                )));
            }
            closes.push(price);

            if closes.len() >= warm_up {
                // Every close was checked on the way in.
                let start = closes.len().saturating_sub(window_len);
                let signal = algorithm.analyze(&PriceWindow::new(&closes[start..]));
                match (signal, open.take()) {
                    (Signal::Buy, None) => {
                        let quantity = capital * config.position_fraction / price;
                        let entry_fee = price * quantity * config.fee_rate;
                        capital -= entry_fee;
                        open = Some(OpenTrade {
                            entry_time: candle.timestamp,
                            entry_price: price,
                            quantity,
                            entry_fee,
                            signal,
                        });
                    }
                    (Signal::Sell, Some(pos)) => {
                        let entry_value = pos.entry_value();
                        let exit_value = price * pos.quantity;
                        let exit_fee = exit_value * config.fee_rate;
                        let pnl = (exit_value - entry_value) - pos.entry_fee - exit_fee;
                        capital += (exit_value - entry_value) - exit_fee;
                        trades.push(TradeResult {
                            entry_time: pos.entry_time,
                            exit_time: candle.timestamp,
                            entry_price: pos.entry_price,
                            exit_price: price,
                            quantity: pos.quantity,
                            signal: pos.signal,
                            entry_fee: pos.entry_fee,
                            exit_fee,
                            fees: pos.entry_fee + exit_fee,
                            pnl,
                            pnl_pct: pnl / entry_value,
                        });
                    }
                    // Buy while long, sell while flat, hold
                    (_, still_open) => open = still_open,
                }
            }

            let unrealized = open
                .as_ref()
                .map(|p| (price - p.entry_price) * p.quantity)
                .unwrap_or(0.0);
            equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                equity: capital + unrealized,
            });
        }

        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        let wins = trades.iter().filter(|t| t.is_win()).count() as u64;
        let total_trades = trades.len() as u64;

        Ok(BacktestReport {
            algorithm: algorithm.kind().id().to_string(),
            pair: config.pair.clone(),
            candles: candles.len(),
            initial_capital: config.initial_capital,
            final_equity: equity.last().copied().unwrap_or(config.initial_capital),
            total_trades,
            wins,
            losses: total_trades - wins,
            win_rate: if total_trades == 0 {
                0.0
            } else {
                wins as f64 / total_trades as f64
            },
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            total_fees: trades.iter().map(|t| t.fees).sum::<f64>()
                + open.as_ref().map(|p| p.entry_fee).unwrap_or(0.0),
            max_drawdown: max_drawdown(&equity),
            sharpe_ratio: sharpe_ratio(&returns),
            position_open_at_end: open.is_some(),
            equity_curve,
            trades,
        })
    }
}
