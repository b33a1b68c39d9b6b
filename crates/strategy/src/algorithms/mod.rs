pub mod arbitrage;
pub mod dca;
pub mod grid;
pub mod momentum;
pub mod rsi_reversal;
pub mod sma_crossover;

pub use arbitrage::Arbitrage;
pub use dca::Dca;
pub use grid::Grid;
pub use momentum::Momentum;
pub use rsi_reversal::RsiReversal;
pub use sma_crossover::SmaCrossover;
