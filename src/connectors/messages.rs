// src/connectors/messages.rs
//! Wire formats of the Bitvavo v2 REST and WebSocket APIs. Amounts arrive as
//! strings and are parsed straight into `Decimal`.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `GET /ticker/price?market=...`
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub market: String,
    pub price: Decimal,
}

/// Row of `GET /{market}/candles`: `[timestamp, open, high, low, close, volume]`.
pub type CandleRow = (i64, Decimal, Decimal, Decimal, Decimal, Decimal);

/// `GET /markets?market=...`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub market: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub min_order_in_base_asset: Option<Decimal>,
    #[serde(default)]
    pub min_order_in_quote_asset: Option<Decimal>,
    #[serde(default, alias = "decimalPlacesBaseAsset")]
    pub quantity_decimals: Option<u32>,
}

/// The markets endpoint answers with an object when filtered, an array otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Body of `POST /order`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder<'a> {
    pub market: &'a str,
    pub side: &'a str,
    pub order_type: &'a str,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: String,
    pub market: String,
    pub status: String,
    #[serde(default)]
    pub filled_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error_code: i64,
    pub error: String,
}

/// Subscription request for the `ticker` channel.
#[derive(Debug, Serialize)]
pub struct Subscribe<'a> {
    pub action: &'a str,
    pub channels: Vec<Channel<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Channel<'a> {
    pub name: &'a str,
    pub markets: &'a [String],
}

/// `{"event":"ticker","market":"BTC-EUR","bestBid":"...","bestAsk":"...","lastPrice":"..."}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEvent {
    pub event: String,
    pub market: String,
    #[serde(default)]
    pub best_bid: Option<Decimal>,
    #[serde(default)]
    pub best_ask: Option<Decimal>,
    #[serde(default)]
    pub last_price: Option<Decimal>,
}

impl TickerEvent {
    /// Last trade price, or the mid of the book when no trade is reported.
    pub fn price(&self) -> Option<Decimal> {
        match (self.last_price, self.best_bid, self.best_ask) {
            (Some(last), _, _) => Some(last),
            (None, Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }
}
