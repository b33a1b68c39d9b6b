//! Fast/slow simple moving average crossover.

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::indicators::sma;
use crate::params::param_usize;
use crate::Strategy;

/// Emits `Buy` when the fast SMA moves above the slow SMA and `Sell` when it
/// moves back below.
///
/// The side of the slow average the fast one was on is carried between
/// ticks and starts as "not above", so a window whose fast average is
/// already above the slow one buys on its first full evaluation.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
    fast_above: bool,
}

impl SmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self> {
        if fast_period < 1 {
            return Err(Error::invalid_param("fast_period", "must be >= 1"));
        }
        if slow_period <= fast_period {
            return Err(Error::invalid_param("slow_period", "must be greater than fast_period"));
        }
        Ok(Self {
            fast_period,
            slow_period,
            fast_above: false,
        })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(
            param_usize(params, "fast_period", 10)?,
            param_usize(params, "slow_period", 30)?,
        )
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &'static str {
        "sma_crossover"
    }

    fn min_lookback(&self) -> usize {
        self.slow_period + 1
    }

    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        if window.len() < self.min_lookback() {
            return Signal::Hold;
        }
        let (Some(fast), Some(slow)) = (
            sma(window.closes, self.fast_period),
            sma(window.closes, self.slow_period),
        ) else {
            return Signal::Hold;
        };

        if !self.fast_above && fast > slow {
            self.fast_above = true;
            Signal::Buy
        } else if self.fast_above && fast < slow {
            self.fast_above = false;
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
