//! RSI reversal: buy when RSI climbs back out of oversold, sell when it
//! drops back out of overbought.

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::indicators::RsiIndicator;
use crate::params::{param_f64, param_usize};
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct RsiReversal {
    indicator: RsiIndicator,
    pub oversold: f64,
    pub overbought: f64,
}

impl RsiReversal {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Result<Self> {
        if period < 2 {
            return Err(Error::invalid_param("period", "must be >= 2"));
        }
        if !(oversold > 0.0 && oversold < overbought && overbought < 100.0) {
            return Err(Error::invalid_param(
                "oversold",
                format!("need 0 < oversold < overbought < 100, got {oversold} / {overbought}"),
            ));
        }
        Ok(Self {
            indicator: RsiIndicator::new(period),
            oversold,
            overbought,
        })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(
            param_usize(params, "period", 14)?,
            param_f64(params, "oversold", 30.0)?,
            param_f64(params, "overbought", 70.0)?,
        )
    }

    pub fn period(&self) -> usize {
        self.indicator.period
    }

    /// Signal for an RSI move from `prev` to `curr`.
    pub fn classify(&self, prev: f64, curr: f64) -> Signal {
        if prev <= self.oversold && curr > self.oversold {
            Signal::Buy
        } else if prev >= self.overbought && curr < self.overbought {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

impl Strategy for RsiReversal {
    fn name(&self) -> &'static str {
        "rsi_reversal"
    }

    fn min_lookback(&self) -> usize {
        self.period() + 2
    }

    fn window_len(&self) -> usize {
        // Wilder smoothing needs a few periods to settle
        (self.period() * 5).max(self.min_lookback())
    }

    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        match self.indicator.last_two(window.closes) {
            Some((prev, curr)) => self.classify(prev, curr),
            None => Signal::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buys_only_when_rsi_crosses_back_above_oversold() {
        let algo = RsiReversal::new(14, 30.0, 70.0).unwrap();
        let rsi_path = [45.0, 35.0, 25.0, 28.0, 32.0, 34.0];
        let signals: Vec<Signal> = rsi_path
            .windows(2)
            .map(|w| algo.classify(w[0], w[1]))
            .collect();
        assert_eq!(
            signals,
            vec![Signal::Hold, Signal::Hold, Signal::Hold, Signal::Buy, Signal::Hold]
        );
    }

    #[test]
    fn sells_when_rsi_falls_back_below_overbought() {
        let algo = RsiReversal::new(14, 30.0, 70.0).unwrap();
        assert_eq!(algo.classify(75.0, 68.0), Signal::Sell);
        assert_eq!(algo.classify(75.0, 72.0), Signal::Hold);
        assert_eq!(algo.classify(65.0, 68.0), Signal::Hold);
    }

    #[test]
    fn price_series_buy_lands_on_the_crossing_tick() {
        let period = 14;
        let mut prices: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        prices.extend((1..=30).map(|i| 101.0 + 1.5 * i as f64));

        let indicator = RsiIndicator::new(period);
        let mut algo = RsiReversal::new(period, 30.0, 70.0).unwrap();

        let mut expected = None;
        let mut buys = Vec::new();
        for n in 1..=prices.len() {
            let window = &prices[..n];
            if expected.is_none() {
                if let Some((prev, curr)) = indicator.last_two(window) {
                    if prev <= 30.0 && curr > 30.0 {
                        expected = Some(n - 1);
                    }
                }
            }
            if algo.analyze(&PriceWindow::new(window)) == Signal::Buy {
                buys.push(n - 1);
            }
        }

        let crossing = expected.expect("series must cross back above 30");
        assert!(crossing > 30, "crossing happens during the recovery");
        assert_eq!(buys, vec![crossing]);
    }

    #[test]
    fn thresholds_are_validated() {
        assert!(RsiReversal::new(14, 70.0, 30.0).is_err());
        assert!(RsiReversal::new(1, 30.0, 70.0).is_err());
        assert!(RsiReversal::new(14, 0.0, 70.0).is_err());
    }
}
