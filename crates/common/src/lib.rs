pub mod config;
pub mod error;
pub mod exchange;
pub mod log;
pub mod market;
pub mod store;
pub mod types;

pub use config::{Config, MarketSource};
pub use error::{Error, Result};
pub use exchange::VenueClient;
pub use log::{LogBuffer, LogEntry, LogLevel, LOG_CAPACITY};
pub use market::MarketDataProvider;
pub use store::StrategyStore;
pub use types::*;
