use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use common::{
    Candle, DateRange, Error, Fill, MarketDataProvider, Order, OrderType, Result, VenueClient,
};

const BASE_URL: &str = "https://api.binance.com";
/// Binance caps one klines response at 1000 rows.
const MAX_KLINES: usize = 1000;

struct Credentials {
    api_key: String,
    secret: String,
}

/// REST API client for Binance.
///
/// Signed order placement when credentials are present; unsigned klines for
/// live price windows and backtest candles either way.
pub struct BinanceClient {
    credentials: Option<Credentials>,
    base_url: String,
    http: Client,
}

impl BinanceClient {
    /// Credentials are optional. Without both the client still serves
    /// market data but reports itself as not configured for orders.
    pub fn new(api_key: Option<String>, secret: Option<String>) -> Result<Self> {
        let credentials = match (api_key, secret) {
            (Some(api_key), Some(secret)) if !api_key.is_empty() && !secret.is_empty() => {
                Some(Credentials { api_key, secret })
            }
            _ => None,
        };
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            credentials,
            base_url: BASE_URL.to_string(),
            http,
        })
    }

    /// Market data only.
    pub fn public() -> Result<Self> {
        Self::new(None, None)
    }

    /// Point at a Binance-compatible endpoint (testnet, mirror, reference venue).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn sign(secret: &str, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Exchange(format!("invalid signing key: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn signed_post(&self, creds: &Credentials, path: &str, params: &str) -> Result<String> {
        let ts = Utc::now().timestamp_millis();
        let query = format!("{params}&timestamp={ts}");
        let signature = Self::sign(&creds.secret, &query)?;
        let body = format!("{query}&signature={signature}");
        let url = format!("{}{path}", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &creds.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        window: Option<(i64, i64)>,
    ) -> Result<Vec<Candle>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url
        );
        if let Some((start, end)) = window {
            url.push_str(&format!("&startTime={start}&endTime={end}"));
        }

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::MarketData(format!("klines HTTP {status}: {text}")));
        }

        let rows: Vec<Vec<Value>> = serde_json::from_str(&text)
            .map_err(|e| Error::MarketData(format!("malformed klines response: {e}")))?;
        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

#[async_trait]
impl VenueClient for BinanceClient {
    fn venue(&self) -> &str {
        "binance"
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn place_order(&self, order: &Order) -> Result<Fill> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::Exchange("Binance credentials are not configured".into()))?;

        let symbol = binance_symbol(&order.pair);
        let mut params = format!(
            "symbol={symbol}&side={}&type={}&quantity={}",
            order.side,
            order.order_type,
            format_decimal(order.quantity)
        );
        if order.order_type == OrderType::Limit {
            let price = order
                .price
                .ok_or_else(|| Error::invalid_param("price", "limit orders need a price"))?;
            params.push_str(&format!("&price={}&timeInForce=GTC", format_decimal(price)));
        }
        params.push_str(&format!("&newClientOrderId={}", order.id));

        debug!(pair = %order.pair, side = %order.side, qty = order.quantity, "Submitting order to Binance");
        let body = self.signed_post(creds, "/api/v3/order", &params).await?;

        let resp: OrderResponse =
            serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))?;

        let fill_price = resp
            .average_price()
            .or(order.price)
            .ok_or_else(|| Error::Exchange(format!("order {} returned no fills", order.id)))?;

        Ok(Fill {
            order_id: resp.client_order_id,
            venue: "binance".into(),
            pair: order.pair.clone(),
            side: order.side,
            fill_price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn price_window(&self, pair: &str, lookback: usize) -> Result<Vec<f64>> {
        let limit = lookback.clamp(1, MAX_KLINES);
        let candles = self.klines(&binance_symbol(pair), "1m", limit, None).await?;
        if candles.is_empty() {
            return Err(Error::MarketData(format!("no klines returned for {pair}")));
        }
        Ok(candles.into_iter().map(|c| c.close).collect())
    }

    async fn candles(
        &self,
        pair: &str,
        interval: Duration,
        range: &DateRange,
    ) -> Result<Vec<Candle>> {
        range.validate()?;
        let code = interval_code(interval)?;
        let symbol = binance_symbol(pair);
        let step_ms = interval.as_millis() as i64;
        let end_ms = range.end.timestamp_millis();

        let mut out = Vec::new();
        let mut cursor = range.start.timestamp_millis();
        while cursor < end_ms {
            let batch = self
                .klines(&symbol, code, MAX_KLINES, Some((cursor, end_ms - 1)))
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            let next = last.timestamp.timestamp_millis() + step_ms;
            out.extend(batch.into_iter().filter(|c| c.timestamp < range.end));
            if next <= cursor {
                break;
            }
            cursor = next;
        }
        debug!(%pair, interval = code, candles = out.len(), "Loaded Binance candles");
        Ok(out)
    }
}

/// "BTC/USDT", "btc-usdt" and "BTCUSDT" all map to "BTCUSDT".
pub fn binance_symbol(pair: &str) -> String {
    pair.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn interval_code(interval: Duration) -> Result<&'static str> {
    Ok(match interval.as_secs() {
        60 => "1m",
        300 => "5m",
        900 => "15m",
        3_600 => "1h",
        14_400 => "4h",
        86_400 => "1d",
        other => {
            return Err(Error::Config(format!(
                "unsupported candle interval {other}s (use 60, 300, 900, 3600, 14400 or 86400)"
            )))
        }
    })
}

fn format_decimal(value: f64) -> String {
    let s = format!("{value:.8}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `[openTime, open, high, low, close, volume, closeTime, ...]`, numbers as strings.
fn parse_kline(row: &[Value]) -> Result<Candle> {
    let malformed = || Error::MarketData(format!("malformed kline row: {row:?}"));
    let num = |i: usize| -> Result<f64> {
        match row.get(i) {
            Some(Value::String(s)) => s.parse().map_err(|_| malformed()),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(malformed),
            _ => Err(malformed()),
        }
    };
    let open_time = row.first().and_then(Value::as_i64).ok_or_else(malformed)?;
    let timestamp = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(malformed)?;
    Ok(Candle {
        timestamp,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    #[serde(default)]
    fills: Vec<FillDetail>,
}

impl OrderResponse {
    /// Quantity-weighted average over partial fills.
    fn average_price(&self) -> Option<f64> {
        let (notional, qty) = self.fills.iter().fold((0.0, 0.0), |(n, q), f| {
            match (f.price.parse::<f64>(), f.qty.parse::<f64>()) {
                (Ok(p), Ok(x)) => (n + p * x, q + x),
                _ => (n, q),
            }
        });
        (qty > 0.0).then(|| notional / qty)
    }
}

#[derive(Deserialize)]
struct FillDetail {
    price: String,
    qty: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use common::OrderSide;

    use super::*;

    #[test]
    fn signature_matches_documented_example() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            BinanceClient::sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn credentials_must_both_be_present() {
        assert!(!BinanceClient::public().unwrap().is_configured());
        assert!(!BinanceClient::new(Some("k".into()), None).unwrap().is_configured());
        assert!(!BinanceClient::new(Some("k".into()), Some(String::new()))
            .unwrap()
            .is_configured());
        assert!(BinanceClient::new(Some("k".into()), Some("s".into()))
            .unwrap()
            .is_configured());
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_orders() {
        let client = BinanceClient::public().unwrap();
        let order = Order::market("binance", "BTCUSDT", OrderSide::Buy, 0.01);
        assert!(matches!(client.place_order(&order).await, Err(Error::Exchange(_))));
    }

    #[test]
    fn symbols_and_intervals() {
        assert_eq!(binance_symbol("eth/usdt"), "ETHUSDT");
        assert_eq!(interval_code(Duration::from_secs(3600)).unwrap(), "1h");
        assert!(matches!(
            interval_code(Duration::from_secs(120)),
            Err(Error::Config(_))
        ));
        assert_eq!(format_decimal(0.00150000), "0.0015");
        assert_eq!(format_decimal(2.0), "2");
    }

    #[test]
    fn kline_rows_parse() {
        let row = vec![
            json!(1_700_000_000_000i64),
            json!("100.5"),
            json!("101.0"),
            json!("99.0"),
            json!("100.0"),
            json!("12.5"),
            json!(1_700_000_059_999i64),
        ];
        let candle = parse_kline(&row).unwrap();
        assert_eq!(candle.close, 100.0);
        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert!(parse_kline(&[json!("x")]).is_err());
    }

    #[test]
    fn average_price_weights_partial_fills() {
        let resp: OrderResponse = serde_json::from_value(json!({
            "clientOrderId": "abc",
            "fills": [
                { "price": "100.0", "qty": "1.0" },
                { "price": "103.0", "qty": "2.0" }
            ]
        }))
        .unwrap();
        assert!((resp.average_price().unwrap() - 102.0).abs() < 1e-12);
    }
}
