use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::AppState;
use backtest::BacktestEngine;
use common::{Config, MarketDataProvider, MarketSource};
use engine::{
    BinanceClient, DexClient, DualSourceMarket, ExecutionRouter, RuntimeManager,
    SqliteStrategyStore, WalletConfig,
};
use paper::{PaperClient, SyntheticConfig, SyntheticMarket};
use strategy::StrategyFileConfig;

/// Slippage bound sent with every relayed swap.
const DEX_MAX_SLIPPAGE_BPS: f64 = 50.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(market = ?cfg.market_source, port = cfg.api_port, "StratBot starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let store = Arc::new(
        SqliteStrategyStore::connect(&cfg.database_url)
            .await
            .context("failed to open strategy database")?,
    );
    info!("Database ready");

    // ── Market data ───────────────────────────────────────────────────────────
    let binance = Arc::new(BinanceClient::new(
        cfg.binance_api_key.clone(),
        cfg.binance_secret.clone(),
    )?);
    let primary: Arc<dyn MarketDataProvider> = match cfg.market_source {
        MarketSource::Binance => binance.clone(),
        MarketSource::Synthetic => {
            info!(seed = cfg.synthetic_seed, "Using synthetic market data");
            Arc::new(SyntheticMarket::new(SyntheticConfig {
                seed: cfg.synthetic_seed,
                ..SyntheticConfig::default()
            })?)
        }
    };
    let market: Arc<dyn MarketDataProvider> = match &cfg.reference_market_url {
        Some(url) => {
            info!(%url, "Reference prices from secondary source");
            let reference = Arc::new(BinanceClient::public()?.with_base_url(url.as_str()));
            Arc::new(DualSourceMarket::new(primary, reference))
        }
        None => primary,
    };

    // ── Execution ─────────────────────────────────────────────────────────────
    let wallet = WalletConfig::from_parts(
        cfg.dex_relayer_url.clone(),
        cfg.dex_wallet_address.clone(),
        cfg.dex_api_key.clone(),
    );
    if wallet.is_none() {
        warn!("DEX relayer not configured, live swaps will be simulated");
    }
    let router = Arc::new(
        ExecutionRouter::new(PaperClient::new(cfg.paper_slippage_bps), cfg.call_timeout)
            .with_venue(binance)
            .with_dex(Arc::new(DexClient::new(wallet, DEX_MAX_SLIPPAGE_BPS)?)),
    );

    // ── Runtime ───────────────────────────────────────────────────────────────
    let manager = Arc::new(RuntimeManager::new(store, market.clone(), router));
    let seeds = StrategyFileConfig::load_or_default(&cfg.strategy_seed_path)?;
    manager.init(&seeds).await?;

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let state = AppState::new(
        manager.clone(),
        Arc::new(BacktestEngine::new(market)),
        cfg.api_token.clone(),
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };
    api::serve(state, cfg.api_port, shutdown).await?;

    manager.shutdown().await;
    info!("All strategies stopped. Exiting.");
    Ok(())
}
