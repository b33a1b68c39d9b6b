//! Dollar-cost averaging: buy a fixed notional on every evaluation.

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::params::param_f64;
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct Dca {
    pub amount: f64,
}

impl Dca {
    pub fn new(amount: f64) -> Result<Self> {
        if !(amount > 0.0) {
            return Err(Error::invalid_param("amount", "must be > 0"));
        }
        Ok(Self { amount })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(param_f64(params, "amount", 100.0)?)
    }
}

impl Strategy for Dca {
    fn name(&self) -> &'static str {
        "dca"
    }

    fn min_lookback(&self) -> usize {
        1
    }

    /// Price action is ignored; a price is only needed to size the order.
    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        if window.is_empty() {
            Signal::Hold
        } else {
            Signal::Buy
        }
    }

    fn order_notional(&self) -> Option<f64> {
        Some(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_buys_when_a_price_exists() {
        let mut dca = Dca::new(50.0).unwrap();
        assert_eq!(dca.analyze(&PriceWindow::new(&[10.0])), Signal::Buy);
        assert_eq!(dca.analyze(&PriceWindow::new(&[10.0, 1.0, 1000.0])), Signal::Buy);
        assert_eq!(dca.analyze(&PriceWindow::new(&[])), Signal::Hold);
        assert_eq!(dca.order_notional(), Some(50.0));
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(Dca::new(0.0).is_err());
        assert!(Dca::new(-5.0).is_err());
    }
}
