pub mod rsi;
pub mod sma;
pub mod stats;

pub use rsi::RsiIndicator;
pub use sma::sma;
