use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::info;

use common::{Candle, DateRange, Error, MarketDataProvider, Result};

/// Candles a single request may generate.
const MAX_CANDLES: usize = 1_000_000;
/// Prices kept per pair for live windows.
const LIVE_HISTORY: usize = 1_000;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub start_price: f64,
    /// Largest relative move per step, e.g. 0.01 = 1%.
    pub volatility: f64,
    /// Constant relative drift per step.
    pub drift: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 100.0,
            volatility: 0.01,
            drift: 0.0,
        }
    }
}

/// Seeded random-walk market.
///
/// Historical candles are a pure function of (seed, pair, interval, range), so
/// backtests over synthetic data are reproducible. Live windows advance one
/// step per `price_window` call.
pub struct SyntheticMarket {
    config: SyntheticConfig,
    live: Mutex<HashMap<String, LiveWalk>>,
}

struct LiveWalk {
    rng: StdRng,
    history: VecDeque<f64>,
}

impl SyntheticMarket {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !(config.volatility > 0.0 && config.volatility < 0.5) {
            return Err(Error::Config(format!(
                "synthetic volatility must be in (0, 0.5), got {}",
                config.volatility
            )));
        }
        if config.drift.abs() >= config.volatility.max(0.01) || !(config.start_price > 0.0) {
            return Err(Error::Config(
                "synthetic drift must be smaller than volatility and start price positive".into(),
            ));
        }
        info!(seed = config.seed, start = config.start_price, "Synthetic market initialized");
        Ok(Self {
            config,
            live: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            config: SyntheticConfig {
                seed,
                ..SyntheticConfig::default()
            },
            live: Mutex::new(HashMap::new()),
        }
    }

    fn step(&self, rng: &mut StdRng, price: f64) -> f64 {
        let shock: f64 = rng.gen_range(-1.0..=1.0);
        price * (1.0 + self.config.drift + self.config.volatility * shock)
    }

    fn rng_for(&self, pair: &str, salt: i64) -> StdRng {
        StdRng::seed_from_u64(self.config.seed ^ fnv1a(pair.as_bytes()) ^ salt as u64)
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticMarket {
    async fn price_window(&self, pair: &str, lookback: usize) -> Result<Vec<f64>> {
        let mut live = self.live.lock().await;
        let walk = live.entry(pair.to_string()).or_insert_with(|| {
            let mut rng = self.rng_for(pair, 0);
            let mut history = VecDeque::with_capacity(LIVE_HISTORY);
            let mut price = self.config.start_price;
            for _ in 0..LIVE_HISTORY {
                price = self.step(&mut rng, price);
                history.push_back(price);
            }
            LiveWalk { rng, history }
        });

        let last = walk.history.back().copied().unwrap_or(self.config.start_price);
        let next = self.step(&mut walk.rng, last);
        if walk.history.len() == LIVE_HISTORY {
            walk.history.pop_front();
        }
        walk.history.push_back(next);

        let skip = walk.history.len().saturating_sub(lookback);
        Ok(walk.history.iter().skip(skip).copied().collect())
    }

    /// The latest live price perturbed by up to one volatility step, standing
    /// in for a second venue quoting the same pair.
    async fn reference_price(&self, pair: &str) -> Result<Option<f64>> {
        let mut live = self.live.lock().await;
        let Some(walk) = live.get_mut(pair) else {
            return Ok(None);
        };
        let Some(last) = walk.history.back().copied() else {
            return Ok(None);
        };
        let noise: f64 = walk.rng.gen_range(-1.0..=1.0);
        Ok(Some(last * (1.0 + self.config.volatility * noise)))
    }

    async fn candles(
        &self,
        pair: &str,
        interval: Duration,
        range: &DateRange,
    ) -> Result<Vec<Candle>> {
        range.validate()?;
        let step = chrono::Duration::from_std(interval)
            .map_err(|e| Error::Config(format!("invalid candle interval: {e}")))?;
        if step <= chrono::Duration::zero() {
            return Err(Error::Config("candle interval must be > 0".into()));
        }
        let span = range.end - range.start;
        let count = (span.num_milliseconds() / step.num_milliseconds().max(1)) as usize;
        if count > MAX_CANDLES {
            return Err(Error::Config(format!(
                "range needs {count} candles, more than the {MAX_CANDLES} limit"
            )));
        }

        let mut rng = self.rng_for(pair, range.start.timestamp() ^ step.num_seconds());
        let mut candles = Vec::with_capacity(count);
        let mut close = self.config.start_price;
        let mut timestamp = range.start;
        for _ in 0..count {
            let open = close;
            close = self.step(&mut rng, open);
            let wick: f64 = rng.gen_range(0.0..=0.5);
            let high = open.max(close) * (1.0 + self.config.volatility * wick);
            let low = open.min(close) * (1.0 - self.config.volatility * wick);
            let volume = 1_000.0 * (1.0 + rng.gen_range(-0.5..=0.5));
            candles.push(Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
            timestamp += step;
        }
        Ok(candles)
    }
}

impl Default for SyntheticMarket {
    fn default() -> Self {
        Self::with_seed(SyntheticConfig::default().seed)
    }
}

/// Stable across processes and toolchains, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ *b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}
