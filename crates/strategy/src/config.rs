use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{Error, Result, StrategyDraft, TradingMode};

/// Default strategy set (TOML), persisted when the store is empty.
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "rsi_reversal"
/// name = "BTC RSI 14"
/// pair = "BTCUSDT"
/// poll_interval_ms = 60000
/// capital = 1000.0
///
/// [strategy.params]
/// period = 14
/// overbought = 70.0
/// oversold = 30.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyEntry>,
}

/// A definition as written by an operator: algorithm tag plus draft config.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyEntry {
    /// Algorithm type identifier, e.g. "grid" or "sma_crossover".
    #[serde(rename = "type")]
    pub algorithm: String,
    #[serde(flatten)]
    pub draft: StrategyDraft,
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse strategy config: {e}")))
    }

    /// The seed file if it exists, otherwise the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "No strategy seed file, using built-in defaults");
            Ok(Self::builtin())
        }
    }

    /// Three paper strategies on BTCUSDT covering trend, oscillator and grid.
    pub fn builtin() -> Self {
        let paper = |name: &str| StrategyDraft {
            mode: TradingMode::Paper,
            ..StrategyDraft::new(name, "BTCUSDT")
        };
        Self {
            strategies: vec![
                StrategyEntry {
                    algorithm: "sma_crossover".into(),
                    draft: paper("BTC SMA 10/30")
                        .with_param("fast_period", 10)
                        .with_param("slow_period", 30),
                },
                StrategyEntry {
                    algorithm: "rsi_reversal".into(),
                    draft: paper("BTC RSI 14")
                        .with_param("period", 14)
                        .with_param("oversold", 30.0)
                        .with_param("overbought", 70.0),
                },
                StrategyEntry {
                    algorithm: "grid".into(),
                    draft: paper("BTC Grid")
                        .with_param("lower_price", 50_000.0)
                        .with_param("upper_price", 120_000.0)
                        .with_param("grid_levels", 20),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Algorithm;

    #[test]
    fn parses_entries_with_params_and_defaults() {
        let cfg = StrategyFileConfig::parse(
            r#"
            [[strategy]]
            type = "grid"
            name = "ETH grid"
            pair = "ETHUSDT"
            mode = "live"
            venue = "uniswap"

            [strategy.params]
            lower_price = 1500.0
            upper_price = 4000
            grid_levels = 12

            [[strategy]]
            type = "dca"
            name = "weekly"
            pair = "BTCUSDT"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.strategies.len(), 2);
        let grid = &cfg.strategies[0];
        assert_eq!(grid.algorithm, "grid");
        assert_eq!(grid.draft.mode, TradingMode::Live);
        assert_eq!(grid.draft.venue, "uniswap");
        Algorithm::from_type(&grid.algorithm, &grid.draft.params).unwrap();

        let dca = &cfg.strategies[1];
        assert_eq!(dca.draft.mode, TradingMode::Paper);
        assert_eq!(dca.draft.poll_interval_ms, 60_000);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = StrategyFileConfig::parse("[[strategy]]\ntype = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builtin_defaults_all_build() {
        let cfg = StrategyFileConfig::builtin();
        assert_eq!(cfg.strategies.len(), 3);
        for entry in &cfg.strategies {
            entry.draft.validate().unwrap();
            Algorithm::from_type(&entry.algorithm, &entry.draft.params).unwrap();
        }
    }
}
