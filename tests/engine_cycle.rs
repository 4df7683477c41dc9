use async_trait::async_trait;
use bitvavo_scalper::config::ScalperConfig;
use bitvavo_scalper::connectors::traits::ExchangeClient;
use bitvavo_scalper::core::engine::TradingEngine;
use bitvavo_scalper::core::journal::TradeJournal;
use bitvavo_scalper::core::portfolio::PortfolioStore;
use bitvavo_scalper::error::ExchangeError;
use bitvavo_scalper::notify::Notifier;
use bitvavo_scalper::strategies::scalper::ScalpingStrategy;
use bitvavo_scalper::types::{Candle, MarketInfo, OrderResponse, Position, Side, Ticker};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Scripted exchange: prices are served in order, orders fail a set number of
/// times before they fill.
struct MockExchange {
    prices: Mutex<VecDeque<Decimal>>,
    closes: Vec<Decimal>,
    failures_left: AtomicU32,
    order_calls: AtomicU32,
}

impl MockExchange {
    fn new(prices: &[Decimal], closes: &[Decimal], failures: u32) -> Self {
        Self {
            prices: Mutex::new(prices.iter().copied().collect()),
            closes: closes.to_vec(),
            failures_left: AtomicU32::new(failures),
            order_calls: AtomicU32::new(0),
        }
    }

    fn order_calls(&self) -> u32 {
        self.order_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn fetch_price(&self, pair: &str) -> Result<Ticker, ExchangeError> {
        let price = self
            .prices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExchangeError::Decode("no more prices".into()))?;
        Ok(Ticker {
            pair: pair.to_string(),
            price,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    async fn fetch_candles(
        &self,
        _pair: &str,
        _interval: &str,
        _limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        Ok(self
            .closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: i as i64 * 60_000,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: dec!(1),
            })
            .collect())
    }

    async fn market_info(&self, pair: &str) -> Result<MarketInfo, ExchangeError> {
        Ok(MarketInfo {
            pair: pair.to_string(),
            quantity_decimals: 4,
            min_order_base: dec!(0.0001),
            min_order_quote: dec!(5),
        })
    }

    async fn place_market_order(
        &self,
        pair: &str,
        _side: Side,
        amount: Decimal,
    ) -> Result<OrderResponse, ExchangeError> {
        let call = self.order_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ExchangeError::Api {
                code: 205,
                message: "temporarily unavailable".into(),
            });
        }
        Ok(OrderResponse {
            id: format!("order-{call}"),
            pair: pair.to_string(),
            status: "filled".into(),
            filled_amount: Some(amount),
        })
    }
}

fn config(demo: bool, daily_target: f64, threshold_buy: f64, retries: u32) -> ScalperConfig {
    let raw = format!(
        r#"{{
            "PAIRS": ["BTC-EUR"],
            "TOTAL_BUDGET": 1000,
            "DAILY_TARGET": {daily_target},
            "TRADING_PERIOD_HOURS": 24,
            "CHECK_INTERVAL": 1,
            "WINDOW_SIZE": 3,
            "TRADE_FEE_PERCENTAGE": 0.25,
            "STOP_LOSS_RETRY_COUNT": {retries},
            "STOP_LOSS": -5,
            "THRESHOLD_BUY": {threshold_buy},
            "THRESHOLD_SELL": 1.0,
            "DEMO_MODE": {demo},
            "USE_RSI": false,
            "STOP_LOSS_WAIT_TIME": 0
        }}"#
    );
    let config = ScalperConfig::from_json(&raw).unwrap();
    config.validate().unwrap();
    config
}

async fn engine(
    config: ScalperConfig,
    exchange: Arc<MockExchange>,
    dir: &Path,
) -> TradingEngine<ScalpingStrategy> {
    let portfolio = PortfolioStore::load(dir).await.unwrap();
    TradingEngine::new(
        config.clone(),
        exchange,
        ScalpingStrategy::new(config),
        portfolio,
        TradeJournal::new(dir),
        Notifier::new("test-bot", None),
    )
}

async fn seed_position(dir: &Path, entry: Decimal, quantity: Decimal) {
    let mut store = PortfolioStore::load(dir).await.unwrap();
    store.open(Position {
        id: "seeded".into(),
        pair: "BTC-EUR".into(),
        entry_price: entry,
        quantity,
        opened_at: Utc::now(),
    });
    store.save().await.unwrap();
}

#[tokio::test]
async fn demo_cycle_buys_the_dip_then_takes_profit() {
    let dir = TempDir::new().unwrap();
    let exchange = Arc::new(MockExchange::new(
        &[dec!(98), dec!(101)],
        &[dec!(100), dec!(100), dec!(100)],
        0,
    ));
    let mut engine = engine(config(true, 1000.0, 1.0, 2), exchange.clone(), dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    let open = engine.portfolio().open_positions("BTC-EUR").to_vec();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].entry_price, dec!(98));
    assert_eq!(open[0].quantity, dec!(10.2040));

    engine.run_cycle().await.unwrap();
    assert!(engine.portfolio().open_positions("BTC-EUR").is_empty());
    assert_eq!(engine.period().state().trades, 1);
    assert!(engine.period().state().realized_profit > Decimal::ZERO);
    // demo fills never reach the exchange
    assert_eq!(exchange.order_calls(), 0);

    let trades = TradeJournal::new(dir.path()).read_all().await.unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].side, Side::Buy);
    assert_eq!(trades[1].side, Side::Sell);
    assert_eq!(trades[1].reason.as_deref(), Some("take_profit"));
    assert!(trades.iter().all(|t| t.demo && t.id.starts_with("demo-")));

    let restored = PortfolioStore::load(dir.path()).await.unwrap();
    assert!(restored.all_positions().is_empty());
    assert_eq!(restored.period().map(|p| p.trades), Some(1));
}

#[tokio::test]
async fn buys_pause_once_period_target_is_reached() {
    let dir = TempDir::new().unwrap();
    let exchange = Arc::new(MockExchange::new(
        &[dec!(98), dec!(101), dec!(95)],
        &[dec!(100), dec!(100), dec!(100)],
        0,
    ));
    let mut engine = engine(config(true, 1.0, 1.0, 2), exchange, dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    engine.run_cycle().await.unwrap();
    assert!(engine.period().buys_paused());

    // 95 is well below the rolling mean but no entry is taken
    engine.run_cycle().await.unwrap();
    assert!(engine.portfolio().open_positions("BTC-EUR").is_empty());
    let trades = TradeJournal::new(dir.path()).read_all().await.unwrap();
    assert_eq!(trades.len(), 2);

    let status = engine.status();
    let status = status.read().await;
    assert!(status.buys_paused);
    assert_eq!(status.period_ends_at, Some(engine.period().ends_at()));
}

#[tokio::test]
async fn live_stop_loss_retries_until_the_sell_fills() {
    let dir = TempDir::new().unwrap();
    seed_position(dir.path(), dec!(100), dec!(1)).await;
    let exchange = Arc::new(MockExchange::new(
        &[dec!(90)],
        &[dec!(100), dec!(100), dec!(100)],
        2,
    ));
    let mut engine = engine(config(false, 1000.0, 50.0, 2), exchange.clone(), dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    assert_eq!(exchange.order_calls(), 3);
    assert!(engine.portfolio().open_positions("BTC-EUR").is_empty());

    let trades = TradeJournal::new(dir.path()).read_all().await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].id, "order-3");
    assert_eq!(trades[0].reason.as_deref(), Some("stop_loss"));
    assert!(trades[0].profit.unwrap() < Decimal::ZERO);
    assert!(!trades[0].demo);
}

#[tokio::test]
async fn failed_stop_loss_keeps_the_position_open() {
    let dir = TempDir::new().unwrap();
    seed_position(dir.path(), dec!(100), dec!(1)).await;
    let exchange = Arc::new(MockExchange::new(
        &[dec!(90)],
        &[dec!(100), dec!(100), dec!(100)],
        10,
    ));
    let mut engine = engine(config(false, 1000.0, 50.0, 1), exchange.clone(), dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    assert_eq!(exchange.order_calls(), 2);
    assert_eq!(engine.portfolio().open_positions("BTC-EUR").len(), 1);
    assert!(TradeJournal::new(dir.path())
        .read_all()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_sell_does_not_free_a_slot_for_a_buy() {
    let dir = TempDir::new().unwrap();
    seed_position(dir.path(), dec!(100), dec!(1)).await;
    // 90 is a stop-loss and also a dip below the mean of 100
    let exchange = Arc::new(MockExchange::new(
        &[dec!(90)],
        &[dec!(100), dec!(100), dec!(100)],
        2,
    ));
    let mut engine = engine(config(false, 1000.0, 1.0, 1), exchange.clone(), dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    assert_eq!(exchange.order_calls(), 2);
    let open = engine.portfolio().open_positions("BTC-EUR");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "seeded");
}

#[tokio::test]
async fn profit_counts_only_the_quantity_sold() {
    let dir = TempDir::new().unwrap();
    seed_position(dir.path(), dec!(100), dec!(1.23456789)).await;
    let exchange = Arc::new(MockExchange::new(
        &[dec!(90)],
        &[dec!(100), dec!(100), dec!(100)],
        0,
    ));
    let mut engine = engine(config(true, 1000.0, 50.0, 2), exchange, dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    let trades = TradeJournal::new(dir.path()).read_all().await.unwrap();
    assert_eq!(trades.len(), 1);
    // market allows 4 decimals
    assert_eq!(trades[0].quantity, dec!(1.2345));
    // 90 * 1.2345 * 0.9975 - 100 * 1.2345
    assert_eq!(trades[0].profit, Some(dec!(-12.6227625)));
    assert_eq!(engine.period().state().realized_profit, dec!(-12.6227625));
    assert!(engine.portfolio().all_positions().is_empty());
}

#[tokio::test]
async fn price_errors_skip_the_pair_without_failing_the_cycle() {
    let dir = TempDir::new().unwrap();
    let exchange = Arc::new(MockExchange::new(&[], &[], 0));
    let mut engine = engine(config(true, 1000.0, 1.0, 2), exchange, dir.path()).await;
    engine.start().await;

    engine.run_cycle().await.unwrap();
    assert!(engine.portfolio().all_positions().is_empty());
    assert_eq!(engine.status().read().await.cycles, 1);
}
