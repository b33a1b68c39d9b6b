use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{DateRange, Error, Params, Result};
use strategy::Algorithm;

fn default_interval_secs() -> u64 {
    3_600
}

fn default_initial_capital() -> f64 {
    10_000.0
}

fn default_fee_rate() -> f64 {
    0.001
}

fn default_position_fraction() -> f64 {
    0.95
}

/// One backtest request.
///
/// ```json
/// { "pair": "BTCUSDT", "algorithm": "sma_crossover", "params": { "fast_period": 5 },
///   "start": "2024-01-01T00:00:00Z", "end": "2024-02-01T00:00:00Z",
///   "interval_secs": 3600, "initial_capital": 10000, "fee_rate": 0.001 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub pair: String,
    pub algorithm: String,
    #[serde(default)]
    pub params: Params,
    #[serde(flatten)]
    pub range: DateRange,
    /// Candle width in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Charged on the notional of each entry and each exit.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Share of current capital committed to each entry.
    #[serde(default = "default_position_fraction")]
    pub position_fraction: f64,
}

impl BacktestConfig {
    pub fn new(pair: impl Into<String>, algorithm: impl Into<String>, range: DateRange) -> Self {
        Self {
            pair: pair.into(),
            algorithm: algorithm.into(),
            params: Params::new(),
            range,
            interval_secs: default_interval_secs(),
            initial_capital: default_initial_capital(),
            fee_rate: default_fee_rate(),
            position_fraction: default_position_fraction(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Check every numeric field and build a fresh algorithm.
    pub fn validate(&self) -> Result<Algorithm> {
        if self.pair.trim().is_empty() {
            return Err(Error::invalid_param("pair", "must not be empty"));
        }
        if self.interval_secs == 0 {
            return Err(Error::invalid_param("interval_secs", "must be > 0"));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(Error::invalid_param("initial_capital", "must be a positive number"));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(Error::invalid_param("fee_rate", "must be in [0, 1)"));
        }
        if !(self.position_fraction > 0.0 && self.position_fraction <= 1.0) {
            return Err(Error::invalid_param("position_fraction", "must be in (0, 1]"));
        }
        self.range.validate()?;
        Algorithm::from_type(&self.algorithm, &self.params)
    }
}
