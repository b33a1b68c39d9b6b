use std::str::FromStr;

use serde::{Deserialize, Serialize};

use common::{Error, Params, PriceWindow, Result, Signal};

use crate::algorithms::{Arbitrage, Dca, Grid, Momentum, RsiReversal, SmaCrossover};
use crate::Strategy;

/// Type tag of every algorithm the runtime can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Grid,
    Momentum,
    SmaCrossover,
    RsiReversal,
    Dca,
    Arbitrage,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 6] = [
        AlgorithmKind::Grid,
        AlgorithmKind::Momentum,
        AlgorithmKind::SmaCrossover,
        AlgorithmKind::RsiReversal,
        AlgorithmKind::Dca,
        AlgorithmKind::Arbitrage,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AlgorithmKind::Grid => "grid",
            AlgorithmKind::Momentum => "momentum",
            AlgorithmKind::SmaCrossover => "sma_crossover",
            AlgorithmKind::RsiReversal => "rsi_reversal",
            AlgorithmKind::Dca => "dca",
            AlgorithmKind::Arbitrage => "arbitrage",
        }
    }

    pub fn catalog_entry(&self) -> CatalogEntry {
        let (name, description, category) = match self {
            AlgorithmKind::Grid => (
                "Grid Trading",
                "Buys each time price falls through a grid line and sells each time it rises through one.",
                "grid",
            ),
            AlgorithmKind::Momentum => (
                "Statistical Momentum",
                "Mean reversion on the z-score of the latest price over a rolling window.",
                "statistical",
            ),
            AlgorithmKind::SmaCrossover => (
                "SMA Crossover",
                "Buys when the fast moving average crosses above the slow one, sells on the reverse cross.",
                "trend",
            ),
            AlgorithmKind::RsiReversal => (
                "RSI Reversal",
                "Buys when RSI recovers through the oversold level, sells when it falls back through overbought.",
                "oscillator",
            ),
            AlgorithmKind::Dca => (
                "Dollar-Cost Averaging",
                "Buys a fixed notional on every tick regardless of price action.",
                "accumulation",
            ),
            AlgorithmKind::Arbitrage => (
                "Cross-Venue Arbitrage",
                "Trades the primary venue when its price diverges from an independent reference price.",
                "arbitrage",
            ),
        };
        CatalogEntry {
            id: self.id().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        AlgorithmKind::ALL
            .into_iter()
            .find(|k| k.id() == wanted)
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// One discoverable algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
}

/// All algorithms available for instantiation.
pub fn catalog() -> Vec<CatalogEntry> {
    AlgorithmKind::ALL.iter().map(|k| k.catalog_entry()).collect()
}

/// A configured signal algorithm. The set is closed: adding one means a new
/// variant here, a tag in `AlgorithmKind`, and an arm in `build`.
#[derive(Debug, Clone)]
pub enum Algorithm {
    Grid(Grid),
    Momentum(Momentum),
    SmaCrossover(SmaCrossover),
    RsiReversal(RsiReversal),
    Dca(Dca),
    Arbitrage(Arbitrage),
}

impl Algorithm {
    /// Construct and validate an algorithm from its tag and parameters.
    pub fn build(kind: AlgorithmKind, params: &Params) -> Result<Self> {
        Ok(match kind {
            AlgorithmKind::Grid => Algorithm::Grid(Grid::from_params(params)?),
            AlgorithmKind::Momentum => Algorithm::Momentum(Momentum::from_params(params)?),
            AlgorithmKind::SmaCrossover => {
                Algorithm::SmaCrossover(SmaCrossover::from_params(params)?)
            }
            AlgorithmKind::RsiReversal => Algorithm::RsiReversal(RsiReversal::from_params(params)?),
            AlgorithmKind::Dca => Algorithm::Dca(Dca::from_params(params)?),
            AlgorithmKind::Arbitrage => Algorithm::Arbitrage(Arbitrage::from_params(params)?),
        })
    }

    /// Parse the type tag, then build.
    pub fn from_type(algorithm: &str, params: &Params) -> Result<Self> {
        Self::build(algorithm.parse()?, params)
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Algorithm::Grid(_) => AlgorithmKind::Grid,
            Algorithm::Momentum(_) => AlgorithmKind::Momentum,
            Algorithm::SmaCrossover(_) => AlgorithmKind::SmaCrossover,
            Algorithm::RsiReversal(_) => AlgorithmKind::RsiReversal,
            Algorithm::Dca(_) => AlgorithmKind::Dca,
            Algorithm::Arbitrage(_) => AlgorithmKind::Arbitrage,
        }
    }

    /// Whether ticks should fetch an independent reference price.
    pub fn needs_reference_price(&self) -> bool {
        matches!(self, Algorithm::Arbitrage(_))
    }

    /// Validate the window, then analyze it.
    ///
    /// A non-finite or non-positive price is malformed input no algorithm can
    /// act on; it is reported as an invariant violation instead of a signal.
    pub fn evaluate(&mut self, window: &PriceWindow<'_>) -> Result<Signal> {
        if let Some((i, bad)) = window
            .closes
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p <= 0.0)
        {
            return Err(Error::Invariant(format!(
                "{} received malformed price {bad} at window index {i}",
                self.kind()
            )));
        }
        if let Some(reference) = window.reference {
            if !reference.is_finite() || reference <= 0.0 {
                return Err(Error::Invariant(format!(
                    "{} received malformed reference price {reference}",
                    self.kind()
                )));
            }
        }
        Ok(self.analyze(window))
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            Algorithm::Grid(a) => a,
            Algorithm::Momentum(a) => a,
            Algorithm::SmaCrossover(a) => a,
            Algorithm::RsiReversal(a) => a,
            Algorithm::Dca(a) => a,
            Algorithm::Arbitrage(a) => a,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Strategy {
        match self {
            Algorithm::Grid(a) => a,
            Algorithm::Momentum(a) => a,
            Algorithm::SmaCrossover(a) => a,
            Algorithm::RsiReversal(a) => a,
            Algorithm::Dca(a) => a,
            Algorithm::Arbitrage(a) => a,
        }
    }
}

impl Strategy for Algorithm {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn min_lookback(&self) -> usize {
        self.inner().min_lookback()
    }

    fn window_len(&self) -> usize {
        self.inner().window_len()
    }

    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal {
        self.inner_mut().analyze(window)
    }

    fn order_notional(&self) -> Option<f64> {
        self.inner().order_notional()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn catalog_lists_every_kind_once() {
        let entries = catalog();
        assert_eq!(entries.len(), AlgorithmKind::ALL.len());
        for kind in AlgorithmKind::ALL {
            assert_eq!(entries.iter().filter(|e| e.id == kind.id()).count(), 1);
            assert_eq!(kind.id().parse::<AlgorithmKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_type_is_a_domain_error() {
        let err = Algorithm::from_type("macd", &Params::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithm(t) if t == "macd"));
    }

    #[test]
    fn build_validates_params() {
        let params: Params =
            serde_json::from_value(json!({ "fast_period": 30, "slow_period": 10 })).unwrap();
        assert!(matches!(
            Algorithm::build(AlgorithmKind::SmaCrossover, &params),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn defaults_build_for_all_but_grid() {
        for kind in AlgorithmKind::ALL {
            let built = Algorithm::build(kind, &Params::new());
            if kind == AlgorithmKind::Grid {
                assert!(built.is_err(), "grid bounds are required");
            } else {
                assert_eq!(built.unwrap().kind(), kind);
            }
        }
    }

    #[test]
    fn malformed_price_is_an_invariant_violation() {
        let mut algo = Algorithm::build(AlgorithmKind::Dca, &Params::new()).unwrap();
        let err = algo.evaluate(&PriceWindow::new(&[1.0, f64::NAN])).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(algo.evaluate(&PriceWindow::new(&[1.0])).unwrap(), Signal::Buy);
    }

    #[test]
    fn only_arbitrage_needs_a_reference() {
        let arb = Algorithm::build(AlgorithmKind::Arbitrage, &Params::new()).unwrap();
        let dca = Algorithm::build(AlgorithmKind::Dca, &Params::new()).unwrap();
        assert!(arb.needs_reference_price());
        assert!(!dca.needs_reference_price());
    }
}
