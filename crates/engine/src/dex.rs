use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{split_pair, Error, Fill, Order, OrderSide, Result, VenueClient};

/// Venue ids served by the swap path. Any id starting with "dex" also routes here.
pub const DEX_VENUES: [&str; 5] = ["uniswap", "sushiswap", "pancakeswap", "jupiter", "raydium"];

pub fn is_dex_venue(venue: &str) -> bool {
    let venue = venue.to_lowercase();
    DEX_VENUES.contains(&venue.as_str()) || venue.starts_with("dex")
}

/// A swap needs a base and a quote token. Checked when a definition is
/// created, so a DEX strategy never reaches its first order with a pair the
/// relayer cannot express.
pub fn check_venue_pair(venue: &str, pair: &str) -> Result<()> {
    if is_dex_venue(venue) && split_pair(pair).is_none() {
        return Err(Error::invalid_param(
            "pair",
            format!("cannot split '{pair}' into base/quote for swaps on {venue}"),
        ));
    }
    Ok(())
}

/// Wallet-backed relayer that signs and broadcasts swaps.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub relayer_url: String,
    pub wallet_address: String,
    pub api_key: Option<String>,
}

impl WalletConfig {
    /// `None` unless both relayer URL and wallet address are set.
    pub fn from_parts(
        relayer_url: Option<String>,
        wallet_address: Option<String>,
        api_key: Option<String>,
    ) -> Option<Self> {
        Some(Self {
            relayer_url: relayer_url?.trim_end_matches('/').to_string(),
            wallet_address: wallet_address?,
            api_key,
        })
    }
}

/// Which side of the swap `amount` fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapAmount {
    /// Receive exactly `amount` of `token_out`.
    ExactOut,
    /// Spend exactly `amount` of `token_in`.
    ExactIn,
}

/// Swap as submitted to the relayer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapRequest {
    pub client_order_id: String,
    pub protocol: String,
    pub token_in: String,
    pub token_out: String,
    pub amount: f64,
    pub amount_kind: SwapAmount,
    pub max_slippage_bps: f64,
    pub recipient: String,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    tx_hash: String,
    /// Quote per base unit actually realized.
    executed_price: f64,
}

/// On-chain swap client for AMM venues.
///
/// Orders are expressed in base-asset quantity: a buy receives exactly that
/// much base, a sell spends exactly that much.
pub struct DexClient {
    wallet: Option<WalletConfig>,
    max_slippage_bps: f64,
    http: Client,
}

impl DexClient {
    pub fn new(wallet: Option<WalletConfig>, max_slippage_bps: f64) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        if let Some(w) = &wallet {
            info!(relayer = %w.relayer_url, wallet = %w.wallet_address, "DEX relayer configured");
        }
        Ok(Self {
            wallet,
            max_slippage_bps,
            http,
        })
    }

    pub fn build_swap(&self, order: &Order, recipient: &str) -> Result<SwapRequest> {
        let (base, quote) = split_pair(&order.pair).ok_or_else(|| {
            Error::invalid_param("pair", format!("cannot split '{}' into base/quote", order.pair))
        })?;
        let (token_in, token_out, amount_kind) = match order.side {
            OrderSide::Buy => (quote, base, SwapAmount::ExactOut),
            OrderSide::Sell => (base, quote, SwapAmount::ExactIn),
        };
        Ok(SwapRequest {
            client_order_id: order.id.clone(),
            protocol: order.venue.to_lowercase(),
            token_in,
            token_out,
            amount: order.quantity,
            amount_kind,
            max_slippage_bps: self.max_slippage_bps,
            recipient: recipient.to_string(),
        })
    }
}

#[async_trait]
impl VenueClient for DexClient {
    fn venue(&self) -> &str {
        "dex"
    }

    fn is_configured(&self) -> bool {
        self.wallet.is_some()
    }

    async fn place_order(&self, order: &Order) -> Result<Fill> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| Error::Exchange("DEX wallet is not configured".into()))?;
        let swap = self.build_swap(order, &wallet.wallet_address)?;

        debug!(protocol = %swap.protocol, token_in = %swap.token_in, token_out = %swap.token_out, amount = swap.amount, "Submitting swap");
        let mut req = self
            .http
            .post(format!("{}/swaps", wallet.relayer_url))
            .json(&swap);
        if let Some(key) = &wallet.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("relayer HTTP {status}: {text}")));
        }
        let body: SwapResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Exchange(format!("malformed relayer response: {e}")))?;
        if !body.executed_price.is_finite() || body.executed_price <= 0.0 {
            return Err(Error::Exchange(format!(
                "relayer reported executed price {} for {}",
                body.executed_price, body.tx_hash
            )));
        }

        Ok(Fill {
            order_id: body.tx_hash,
            venue: order.venue.clone(),
            pair: order.pair.clone(),
            side: order.side,
            fill_price: body.executed_price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dex_venue_ids() {
        assert!(is_dex_venue("uniswap"));
        assert!(is_dex_venue("Raydium"));
        assert!(is_dex_venue("dex-aggregator"));
        assert!(!is_dex_venue("binance"));
    }

    #[test]
    fn wallet_needs_relayer_and_address() {
        assert!(WalletConfig::from_parts(Some("http://r".into()), None, None).is_none());
        let w = WalletConfig::from_parts(Some("http://r/".into()), Some("0xabc".into()), None)
            .unwrap();
        assert_eq!(w.relayer_url, "http://r");
    }

    #[test]
    fn buy_swaps_quote_for_exact_base() {
        let client = DexClient::new(None, 50.0).unwrap();
        let order = Order::market("uniswap", "ETH/USDC", OrderSide::Buy, 0.5);
        let swap = client.build_swap(&order, "0xabc").unwrap();
        assert_eq!(swap.token_in, "USDC");
        assert_eq!(swap.token_out, "ETH");
        assert_eq!(swap.amount_kind, SwapAmount::ExactOut);
        assert_eq!(swap.protocol, "uniswap");

        let sell = Order::market("uniswap", "ETHUSDC", OrderSide::Sell, 0.5);
        let swap = client.build_swap(&sell, "0xabc").unwrap();
        assert_eq!(swap.token_in, "ETH");
        assert_eq!(swap.amount_kind, SwapAmount::ExactIn);
    }

    #[tokio::test]
    async fn unconfigured_wallet_refuses_orders() {
        let client = DexClient::new(None, 50.0).unwrap();
        assert!(!client.is_configured());
        let order = Order::market("uniswap", "ETH/USDC", OrderSide::Buy, 0.5);
        assert!(client.place_order(&order).await.is_err());
    }
}
