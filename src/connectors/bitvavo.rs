// src/connectors/bitvavo.rs
use crate::config::{ApiCredentials, RuntimeSettings};
use crate::connectors::messages::{
    ApiError, CandleRow, Market, NewOrder, OneOrMany, PlacedOrder, TickerPrice,
};
use crate::connectors::traits::ExchangeClient;
use crate::error::ExchangeError;
use crate::types::{Candle, MarketInfo, OrderResponse, Side, Ticker};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_QUANTITY_DECIMALS: u32 = 6;

pub struct BitvavoClient {
    credentials: Option<ApiCredentials>,
    http_client: Client,
    base_rest_url: String,
    access_window_ms: u64,
}

impl BitvavoClient {
    pub fn new(settings: &RuntimeSettings) -> Result<Self, ExchangeError> {
        let http_client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            credentials: settings.credentials.clone(),
            http_client,
            base_rest_url: settings.rest_url.trim_end_matches('/').to_string(),
            access_window_ms: settings.access_window_ms,
        })
    }

    /// Path part used in the signature, e.g. `/v2/order`.
    fn signed_path(&self, endpoint: &str) -> Result<String, ExchangeError> {
        let url = Url::parse(&format!("{}{}", self.base_rest_url, endpoint))
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        Ok(match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
        signed: bool,
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_rest_url, endpoint);
        let mut builder = self.http_client.request(method.clone(), &url);

        if signed {
            let credentials = self
                .credentials
                .as_ref()
                .ok_or_else(|| ExchangeError::Signing("API credentials not configured".into()))?;
            let timestamp = Utc::now().timestamp_millis().to_string();
            let path = self.signed_path(endpoint)?;
            let signature = sign(
                &credentials.api_secret,
                &timestamp,
                method.as_str(),
                &path,
                body.as_deref().unwrap_or(""),
            )?;
            builder = builder
                .header("Bitvavo-Access-Key", &credentials.api_key)
                .header("Bitvavo-Access-Signature", signature)
                .header("Bitvavo-Access-Timestamp", timestamp)
                .header("Bitvavo-Access-Window", self.access_window_ms.to_string());
        }
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%status, endpoint, "bitvavo response");
        decode_response(status, &text)
    }
}

/// Bitvavo signature: hex(HMAC-SHA256(secret, timestamp + method + path + body)).
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signing(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn decode_response<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, ExchangeError> {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(text) {
        return Err(ExchangeError::Api {
            code: api_error.error_code,
            message: api_error.error,
        });
    }
    if !status.is_success() {
        return Err(ExchangeError::Decode(format!("HTTP {status}: {text}")));
    }
    serde_json::from_str(text).map_err(|e| ExchangeError::Decode(format!("{e}: {text}")))
}

#[async_trait]
impl ExchangeClient for BitvavoClient {
    async fn fetch_price(&self, pair: &str) -> Result<Ticker, ExchangeError> {
        let query = serde_urlencoded::to_string([("market", pair)])
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let resp: TickerPrice = self
            .request(Method::GET, &format!("/ticker/price?{query}"), None, false)
            .await?;

        Ok(Ticker {
            pair: resp.market,
            price: resp.price,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    async fn fetch_candles(
        &self,
        pair: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let query = serde_urlencoded::to_string([
            ("interval", interval.to_lowercase()),
            ("limit", limit.to_string()),
        ])
        .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let rows: Vec<CandleRow> = self
            .request(Method::GET, &format!("/{pair}/candles?{query}"), None, false)
            .await?;

        // Bitvavo returns newest first.
        let mut candles: Vec<Candle> = rows
            .into_iter()
            .map(|(timestamp, open, high, low, close, volume)| Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    async fn market_info(&self, pair: &str) -> Result<MarketInfo, ExchangeError> {
        let query = serde_urlencoded::to_string([("market", pair)])
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let markets: OneOrMany<Market> = self
            .request(Method::GET, &format!("/markets?{query}"), None, false)
            .await?;

        let market = markets
            .into_vec()
            .into_iter()
            .find(|m| m.market.eq_ignore_ascii_case(pair))
            .ok_or_else(|| ExchangeError::UnknownMarket(pair.to_string()))?;

        Ok(MarketInfo {
            pair: market.market,
            quantity_decimals: market
                .quantity_decimals
                .unwrap_or(DEFAULT_QUANTITY_DECIMALS),
            min_order_base: market.min_order_in_base_asset.unwrap_or(Decimal::ZERO),
            min_order_quote: market.min_order_in_quote_asset.unwrap_or(Decimal::ZERO),
        })
    }

    async fn place_market_order(
        &self,
        pair: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderResponse, ExchangeError> {
        let side_str = side.to_string();
        let order = NewOrder {
            market: pair,
            side: &side_str,
            order_type: "market",
            amount: amount.normalize().to_string(),
        };
        let body = serde_json::to_string(&order).map_err(|e| ExchangeError::Decode(e.to_string()))?;

        info!("🚀 Sending order: {} {} {}", side_str, order.amount, pair);

        let resp: PlacedOrder = self
            .request(Method::POST, "/order", Some(body), true)
            .await?;

        Ok(OrderResponse {
            id: resp.order_id,
            pair: resp.market,
            status: resp.status,
            filled_amount: resp.filled_amount,
        })
    }
}
