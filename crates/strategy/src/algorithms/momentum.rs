//! Statistical mean reversion on the z-score of the latest price.

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::indicators::stats::z_score;
use crate::params::{param_f64, param_usize};
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct Momentum {
    pub window: usize,
    pub z_threshold: f64,
}

impl Momentum {
    pub fn new(window: usize, z_threshold: f64) -> Result<Self> {
        if window < 2 {
            return Err(Error::invalid_param("window", "must be >= 2"));
        }
        if !(z_threshold > 0.0) {
            return Err(Error::invalid_param("z_threshold", "must be > 0"));
        }
        Ok(Self { window, z_threshold })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(
            param_usize(params, "window", 20)?,
            param_f64(params, "z_threshold", 2.0)?,
        )
    }
}

impl Strategy for Momentum {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn min_lookback(&self) -> usize {
        self.window
    }

    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        if window.len() < self.window {
            return Signal::Hold;
        }
        let sample = &window.closes[window.len() - self.window..];
        let Some(latest) = window.last() else {
            return Signal::Hold;
        };
        match z_score(latest, sample) {
            Some(z) if z > self.z_threshold => Signal::Sell,
            Some(z) if z < -self.z_threshold => Signal::Buy,
            _ => Signal::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_last(last: f64) -> Vec<f64> {
        let mut prices = vec![100.0; 19];
        prices.push(last);
        prices
    }

    #[test]
    fn overextension_up_sells() {
        let mut m = Momentum::new(20, 2.0).unwrap();
        assert_eq!(m.analyze(&PriceWindow::new(&with_last(120.0))), Signal::Sell);
    }

    #[test]
    fn overextension_down_buys() {
        let mut m = Momentum::new(20, 2.0).unwrap();
        assert_eq!(m.analyze(&PriceWindow::new(&with_last(80.0))), Signal::Buy);
    }

    #[test]
    fn ordinary_noise_holds() {
        let mut m = Momentum::new(4, 2.0).unwrap();
        let prices = [100.0, 101.0, 99.0, 100.5];
        assert_eq!(m.analyze(&PriceWindow::new(&prices)), Signal::Hold);
    }

    #[test]
    fn flat_window_holds() {
        let mut m = Momentum::new(5, 2.0).unwrap();
        assert_eq!(m.analyze(&PriceWindow::new(&[10.0; 5])), Signal::Hold);
    }

    #[test]
    fn uses_only_the_last_window_prices() {
        let mut m = Momentum::new(20, 2.0).unwrap();
        let mut prices = vec![500.0; 30];
        prices.extend(with_last(120.0));
        assert_eq!(m.analyze(&PriceWindow::new(&prices)), Signal::Sell);
    }
}
