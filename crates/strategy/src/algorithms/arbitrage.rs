//! Cross-venue spread: trade the primary venue against an independently
//! sourced reference price of the same instrument.

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::params::param_f64;
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct Arbitrage {
    /// Relative spread, e.g. 0.005 = 0.5%.
    pub spread_threshold: f64,
}

impl Arbitrage {
    pub fn new(spread_threshold: f64) -> Result<Self> {
        if !(spread_threshold > 0.0) {
            return Err(Error::invalid_param("spread_threshold", "must be > 0"));
        }
        Ok(Self { spread_threshold })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(param_f64(params, "spread_threshold", 0.005)?)
    }
}

impl Strategy for Arbitrage {
    fn name(&self) -> &'static str {
        "arbitrage"
    }

    fn min_lookback(&self) -> usize {
        1
    }

    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        let (Some(primary), Some(reference)) = (window.last(), window.reference) else {
            return Signal::Hold;
        };
        if primary <= 0.0 {
            return Signal::Hold;
        }
        let spread = (reference - primary) / primary;
        if spread > self.spread_threshold {
            // primary venue is the cheap one
            Signal::Buy
        } else if spread < -self.spread_threshold {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
