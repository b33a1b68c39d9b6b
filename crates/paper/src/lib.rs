mod client;
mod synthetic;

pub use client::PaperClient;
pub use synthetic::{SyntheticConfig, SyntheticMarket};
