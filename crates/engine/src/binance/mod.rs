mod rest;

pub use rest::{binance_symbol, BinanceClient};
