pub mod binance;
pub mod dex;
pub mod instance;
pub mod manager;
pub mod market;
pub mod router;
pub mod store;

pub use binance::BinanceClient;
pub use dex::{DexClient, WalletConfig};
pub use instance::{OpenPosition, StrategyInstance};
pub use manager::RuntimeManager;
pub use market::DualSourceMarket;
pub use router::{ExecutionRouter, VenueKind};
pub use store::SqliteStrategyStore;
