use crate::error::ExchangeError;
use crate::types::{Candle, MarketInfo, OrderResponse, Side, Ticker};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Everything the engine needs from an exchange. The live implementation is
/// `BitvavoClient`; tests plug in scripted mocks.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn fetch_price(&self, pair: &str) -> Result<Ticker, ExchangeError>;

    /// Candles oldest first.
    async fn fetch_candles(
        &self,
        pair: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn market_info(&self, pair: &str) -> Result<MarketInfo, ExchangeError>;

    /// `amount` is in base currency.
    async fn place_market_order(
        &self,
        pair: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderResponse, ExchangeError>;
}
