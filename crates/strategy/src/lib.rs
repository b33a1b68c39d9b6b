pub mod algorithms;
pub mod config;
pub mod indicators;
pub mod params;
pub mod registry;

pub use config::{StrategyEntry, StrategyFileConfig};
pub use registry::{catalog, Algorithm, AlgorithmKind, CatalogEntry};

use common::{PriceWindow, Signal};

/// All signal algorithms must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Algorithm type identifier.
    fn name(&self) -> &'static str;

    /// Shortest window `analyze` can act on. Shorter windows yield `Hold`.
    fn min_lookback(&self) -> usize;

    /// How many closes a live tick should fetch.
    fn window_len(&self) -> usize {
        self.min_lookback()
    }

    /// Turn the latest window into a decision.
    ///
    /// Deterministic for the same sequence of windows and parameters. Takes
    /// `&mut self` only for algorithms that carry a cursor between ticks.
    fn analyze(&mut self, window: &PriceWindow<'_>) -> Signal;

    /// Fixed quote notional per order, for algorithms that size their own buys.
    fn order_notional(&self) -> Option<f64> {
        None
    }
}
