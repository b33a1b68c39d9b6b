mod backtests;
mod health;
mod strategies;

pub use backtests::backtest_router;
pub use health::health_router;
pub use strategies::strategy_router;
