use std::time::Duration;

use crate::{Error, Result};

/// Where live price windows and backtest candles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSource {
    Binance,
    Synthetic,
}

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // HTTP surface
    pub api_token: String,
    pub api_port: u16,

    // Market data
    pub market_source: MarketSource,
    pub reference_market_url: Option<String>,
    pub synthetic_seed: u64,

    // CEX credentials; absent means live orders are simulated
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,

    // DEX relayer; absent means live swaps are simulated
    pub dex_relayer_url: Option<String>,
    pub dex_wallet_address: Option<String>,
    pub dex_api_key: Option<String>,

    // Execution
    pub paper_slippage_bps: f64,
    pub call_timeout: Duration,

    // Default strategy set used when the store is empty
    pub strategy_seed_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let market_source = match env
            .optional("MARKET_DATA")
            .unwrap_or_else(|| "binance".to_string())
            .to_lowercase()
            .as_str()
        {
            "binance" => MarketSource::Binance,
            "synthetic" => MarketSource::Synthetic,
            other => {
                return Err(Error::Config(format!(
                    "MARKET_DATA must be 'binance' or 'synthetic', got: '{other}'"
                )))
            }
        };

        let paper_slippage_bps: f64 = env.parsed("PAPER_SLIPPAGE_BPS", 0.0)?;
        if !(0.0..10_000.0).contains(&paper_slippage_bps) {
            return Err(Error::Config(format!(
                "PAPER_SLIPPAGE_BPS must be in [0, 10000), got {paper_slippage_bps}"
            )));
        }

        let call_timeout_secs: u64 = env.parsed("CALL_TIMEOUT_SECS", 10)?;
        if call_timeout_secs == 0 {
            return Err(Error::Config("CALL_TIMEOUT_SECS must be > 0".into()));
        }

        Ok(Config {
            database_url: env.required("DATABASE_URL")?,
            api_token: env.required("API_TOKEN")?,
            api_port: env.parsed("API_PORT", 8080)?,
            market_source,
            reference_market_url: env.optional("REFERENCE_MARKET_URL"),
            synthetic_seed: env.parsed("SYNTHETIC_SEED", 42)?,
            binance_api_key: env.optional("BINANCE_API_KEY"),
            binance_secret: env.optional("BINANCE_SECRET"),
            dex_relayer_url: env.optional("DEX_RELAYER_URL"),
            dex_wallet_address: env.optional("DEX_WALLET_ADDRESS"),
            dex_api_key: env.optional("DEX_API_KEY"),
            paper_slippage_bps,
            call_timeout: Duration::from_secs(call_timeout_secs),
            strategy_seed_path: env
                .optional("STRATEGY_SEED_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| {
            Error::Config(format!(
                "Required environment variable '{key}' is not set. Check your .env file."
            ))
        })
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("{key}='{raw}' is invalid: {e}"))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://strategies.db"),
            ("API_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_port, 8080);
        assert_eq!(cfg.market_source, MarketSource::Binance);
        assert_eq!(cfg.call_timeout, Duration::from_secs(10));
        assert_eq!(cfg.paper_slippage_bps, 0.0);
        assert!(cfg.binance_api_key.is_none());
        assert_eq!(cfg.strategy_seed_path, "config/strategies.toml");
    }

    #[test]
    fn missing_required_variable_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("API_TOKEN", "secret")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn blank_credentials_count_as_absent() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("API_TOKEN", "t"),
            ("BINANCE_API_KEY", "   "),
            ("MARKET_DATA", "Synthetic"),
        ]))
        .unwrap();
        assert!(cfg.binance_api_key.is_none());
        assert_eq!(cfg.market_source, MarketSource::Synthetic);
    }

    #[test]
    fn unparsable_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("API_TOKEN", "t"),
            ("API_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("API_PORT")));
    }
}
