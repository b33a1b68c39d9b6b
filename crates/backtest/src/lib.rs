//! Deterministic single-pass replay of a signal algorithm over candles.

mod config;
mod engine;
pub mod metrics;
mod report;

pub use config::BacktestConfig;
pub use engine::BacktestEngine;
pub use report::{BacktestReport, EquityPoint, TradeResult};
