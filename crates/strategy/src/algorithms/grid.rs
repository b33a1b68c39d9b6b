//! Grid trading: buy each time price falls through a grid line, sell each
//! time it rises through one.

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::params::{param_usize, required_f64};
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct Grid {
    levels: Vec<f64>,
    /// Price seen on the previous tick; the first tick only sets it.
    last_price: Option<f64>,
}

impl Grid {
    pub const DEFAULT_LEVELS: usize = 10;

    /// `count` evenly spaced levels starting at `lower`, `(upper - lower) / count` apart.
    pub fn new(lower: f64, upper: f64, count: usize) -> Result<Self> {
        if !(lower > 0.0) {
            return Err(Error::invalid_param("lower_price", "must be > 0"));
        }
        if !(upper > lower) {
            return Err(Error::invalid_param("upper_price", "must be greater than lower_price"));
        }
        if count < 2 {
            return Err(Error::invalid_param("grid_levels", "must be >= 2"));
        }
        let step = (upper - lower) / count as f64;
        let levels = (0..count).map(|i| lower + step * i as f64).collect();
        Ok(Self { levels, last_price: None })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let lower = required_f64(params, "lower_price")?;
        let upper = required_f64(params, "upper_price")?;
        let count = param_usize(params, "grid_levels", Self::DEFAULT_LEVELS)?;
        Self::new(lower, upper, count)
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }
}

impl Strategy for Grid {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn min_lookback(&self) -> usize {
        1
    }

    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        let Some(price) = window.last() else {
            return Signal::Hold;
        };
        let Some(prev) = self.last_price.replace(price) else {
            return Signal::Hold;
        };

        let crossed_down = self.levels.iter().any(|&l| prev > l && price <= l);
        let crossed_up = self.levels.iter().any(|&l| prev < l && price >= l);

        if crossed_down {
            Signal::Buy
        } else if crossed_up {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
