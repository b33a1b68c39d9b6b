use thiserror::Error;

use crate::StrategyId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown algorithm type '{0}'")]
    UnknownAlgorithm(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy {0} not found")]
    NotFound(StrategyId),

    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether a failure inside a running strategy's tick must halt it.
    ///
    /// Structural failures (a misconfigured algorithm, malformed input the
    /// algorithm refuses) are fatal. Venue, network and market-data failures
    /// are transient and only cost the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Invariant(_)
                | Error::UnknownAlgorithm(_)
                | Error::InvalidParameter { .. }
                | Error::Config(_)
        )
    }

    /// Configuration errors are rejected synchronously, before any state exists.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownAlgorithm(_) | Error::InvalidParameter { .. } | Error::Config(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_failures_are_transient() {
        assert!(!Error::Exchange("503".into()).is_fatal());
        assert!(!Error::MarketData("empty".into()).is_fatal());
        assert!(!Error::Timeout { operation: "place_order".into(), secs: 10 }.is_fatal());
    }

    #[test]
    fn structural_failures_are_fatal() {
        assert!(Error::Invariant("NaN close".into()).is_fatal());
        assert!(Error::invalid_param("window", "must be >= 2").is_fatal());
        assert!(Error::UnknownAlgorithm("macd".into()).is_configuration());
        assert!(!Error::NotFound(7).is_configuration());
    }
}
