// src/core/engine.rs
use crate::config::ScalperConfig;
use crate::connectors::feed::PriceCache;
use crate::connectors::traits::ExchangeClient;
use crate::core::journal::TradeJournal;
use crate::core::period::PeriodTracker;
use crate::core::portfolio::PortfolioStore;
use crate::core::sizing::position_size;
use crate::core::status::{shared_status, SharedStatus};
use crate::error::ExchangeError;
use crate::notify::Notifier;
use crate::strategies::indicators;
use crate::strategies::traits::{Strategy, TickContext};
use crate::types::{ExitReason, MarketInfo, OrderResponse, Position, Side, Signal, Ticker, TradeRecord};
use crate::utils::precision::{format_price, normalize_quantity, to_decimal};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct TradingEngine<S> {
    config: ScalperConfig,
    exchange: Arc<dyn ExchangeClient>,
    strategy: S,
    portfolio: PortfolioStore,
    journal: TradeJournal,
    period: PeriodTracker,
    notifier: Notifier,
    price_cache: Option<PriceCache>,
    markets: HashMap<String, MarketInfo>,
    status: SharedStatus,
    cycles: u64,
    started_at: DateTime<Utc>,
}

impl<S> TradingEngine<S>
where
    S: Strategy,
{
    pub fn new(
        config: ScalperConfig,
        exchange: Arc<dyn ExchangeClient>,
        strategy: S,
        portfolio: PortfolioStore,
        journal: TradeJournal,
        notifier: Notifier,
    ) -> Self {
        let now = Utc::now();
        let period = PeriodTracker::new(
            config.trading_period_hours,
            config.daily_target,
            portfolio.period().cloned(),
            now,
        );
        Self {
            config,
            exchange,
            strategy,
            portfolio,
            journal,
            period,
            notifier,
            price_cache: None,
            markets: HashMap::new(),
            status: shared_status(),
            cycles: 0,
            started_at: now,
        }
    }

    /// Prefer streamed prices over REST polling when available.
    pub fn with_price_cache(mut self, cache: PriceCache) -> Self {
        self.price_cache = Some(cache);
        self
    }

    pub fn with_status(mut self, status: SharedStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn portfolio(&self) -> &PortfolioStore {
        &self.portfolio
    }

    pub fn period(&self) -> &PeriodTracker {
        &self.period
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.start().await;

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.check_interval));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Engine loop running. Demo mode: {}", self.config.demo_mode);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("Cycle failed: {:#}", e);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.stop().await
    }

    /// Warm up price histories and announce the startup parameters.
    pub async fn start(&mut self) {
        let limit = self.config.history_capacity();
        for pair in self.config.pairs.clone() {
            match self
                .exchange
                .fetch_candles(&pair, &self.config.rsi_interval, limit)
                .await
            {
                Ok(candles) => {
                    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
                    if closes.len() >= limit {
                        info!(pair = %pair, "✅ {} historical prices loaded", closes.len());
                    } else {
                        warn!(
                            pair = %pair,
                            "⚠️ Insufficient data ({} candles, needed: {})",
                            closes.len(),
                            limit
                        );
                    }
                    self.strategy.warm_up(&pair, &closes);
                }
                Err(e) => warn!(pair = %pair, "❌ Error fetching historical prices: {}", e),
            }
        }

        let mode = if self.config.demo_mode { "DEMO" } else { "LIVE" };
        self.notifier.alert(&format!(
            "🚀 ScalpingBot v{} starting in {} mode on {}",
            VERSION,
            mode,
            self.config.pairs.join(", ")
        ));
        info!(
            "⚠️ Startup info:\n{}",
            serde_json::to_string_pretty(&self.config).unwrap_or_default()
        );
        self.publish_status().await;
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.portfolio.set_period(self.period.state().clone());
        self.portfolio
            .save()
            .await
            .context("saving portfolio on shutdown")?;
        self.publish_status().await;
        self.notifier.alert("✅ ScalpingBot trading ended.");
        Ok(())
    }

    /// One pass over all pairs.
    pub async fn run_cycle(&mut self) -> Result<()> {
        if let Some(finished) = self.period.roll(Utc::now()) {
            self.notifier.alert(&format!(
                "📅 Trading period closed: profit {} EUR over {} trades (target {})",
                finished.realized_profit.round_dp(2),
                finished.trades,
                self.period.target()
            ));
        }

        self.cycles += 1;
        info!(cycle = self.cycles, "🐌 New cycle started");

        for pair in self.config.pairs.clone() {
            if let Err(e) = self.process_pair(&pair).await {
                warn!(pair = %pair, "❌ {:#}", e);
            }
        }

        self.portfolio.set_period(self.period.state().clone());
        self.portfolio.save().await.context("saving portfolio")?;
        self.publish_status().await;
        Ok(())
    }

    async fn process_pair(&mut self, pair: &str) -> Result<()> {
        let ticker = self.current_price(pair).await?;
        let positions = self.portfolio.open_positions(pair).to_vec();
        let atr = if positions.is_empty() {
            None
        } else {
            self.fetch_atr(pair).await
        };

        let signals = self.strategy.on_tick(
            &ticker,
            TickContext {
                positions: &positions,
                atr,
            },
        );

        if let Some(snapshot) = self.strategy.snapshot(pair) {
            info!(
                pair = %pair,
                "💎 Price={} EUR - mean={} - change={} - RSI={} - open positions: {}",
                format_price(ticker.price),
                fmt_opt(snapshot.window_mean, 8),
                fmt_opt(snapshot.change_pct, 3),
                fmt_opt(snapshot.rsi, 2),
                positions.len()
            );
        }

        for signal in signals {
            let result = match signal {
                Signal::Sell {
                    position_id,
                    price,
                    reason,
                } => self.close_position(pair, &position_id, price, reason).await,
                Signal::Buy { price } => {
                    // Sells of this tick may have failed and left positions open.
                    let open = self.portfolio.open_positions(pair).len();
                    if open >= self.config.max_trades_per_pair {
                        info!(
                            pair = %pair,
                            "🤚 Skipping buy: {} open position(s), limit {}",
                            open,
                            self.config.max_trades_per_pair
                        );
                        continue;
                    }
                    self.open_position(pair, price, atr).await
                }
            };
            if let Err(e) = result {
                warn!(pair = %pair, "❌ Order handling failed: {:#}", e);
            }
        }
        Ok(())
    }

    async fn current_price(&self, pair: &str) -> Result<Ticker> {
        if let Some(cache) = &self.price_cache {
            let max_age = Duration::from_secs(self.config.check_interval.saturating_mul(2));
            if let Some(price) = cache.fresh(pair, max_age).await {
                return Ok(Ticker {
                    pair: pair.to_string(),
                    price,
                    timestamp: Utc::now().timestamp_millis(),
                });
            }
        }
        let ticker = self
            .exchange
            .fetch_price(pair)
            .await
            .with_context(|| format!("fetching price for {pair}"))?;
        Ok(ticker)
    }

    async fn fetch_atr(&self, pair: &str) -> Option<f64> {
        match self
            .exchange
            .fetch_candles(pair, &self.config.rsi_interval, self.config.atr_period + 1)
            .await
        {
            Ok(candles) => indicators::atr(&candles, self.config.atr_period),
            Err(e) => {
                warn!(pair = %pair, "❌ Error in ATR calculation: {}", e);
                None
            }
        }
    }

    async fn market(&mut self, pair: &str) -> Result<MarketInfo> {
        if let Some(market) = self.markets.get(pair) {
            return Ok(market.clone());
        }
        let market = self
            .exchange
            .market_info(pair)
            .await
            .with_context(|| format!("loading market rules for {pair}"))?;
        self.markets.insert(pair.to_string(), market.clone());
        Ok(market)
    }

    async fn open_position(&mut self, pair: &str, price: Decimal, atr: Option<f64>) -> Result<()> {
        if self.period.buys_paused() {
            info!(
                pair = %pair,
                "🎯 Period target reached ({} EUR), skipping buy",
                self.period.state().realized_profit.round_dp(2)
            );
            return Ok(());
        }

        let atr = match atr {
            Some(atr) => Some(atr),
            None => self.fetch_atr(pair).await,
        };
        let market = self.market(pair).await?;
        let quantity = match position_size(&self.config, pair, price, atr, &market) {
            Ok(quantity) => quantity,
            Err(e) => {
                warn!(pair = %pair, "🤚 Skipping buy: {}", e);
                return Ok(());
            }
        };

        let order = self.execute_order(pair, Side::Buy, quantity).await?;
        let filled = order
            .filled_amount
            .filter(|q| !q.is_zero())
            .unwrap_or(quantity);

        let position = Position {
            id: Uuid::new_v4().to_string(),
            pair: pair.to_string(),
            entry_price: price,
            quantity: filled,
            opened_at: Utc::now(),
        };
        self.portfolio.open(position.clone());
        self.portfolio.save().await.context("saving portfolio")?;
        self.record_trade(TradeRecord {
            id: order.id,
            pair: pair.to_string(),
            side: Side::Buy,
            price,
            quantity: filled,
            profit: None,
            reason: Some("entry".to_string()),
            demo: self.config.demo_mode,
            timestamp: position.opened_at,
        })
        .await;

        self.notifier.alert(&format!(
            "🟢 {}: BUY {} @ {} EUR (ATR: {})",
            pair,
            filled,
            format_price(price),
            fmt_opt(atr, 8)
        ));
        Ok(())
    }

    async fn close_position(
        &mut self,
        pair: &str,
        position_id: &str,
        price: Decimal,
        reason: ExitReason,
    ) -> Result<()> {
        let Some(position) = self.portfolio.position(pair, position_id).cloned() else {
            return Ok(());
        };

        let quantity = match self.market(pair).await {
            Ok(market) => normalize_quantity(position.quantity, market.quantity_decimals),
            Err(e) => {
                warn!(pair = %pair, "Market rules unavailable, selling raw quantity: {:#}", e);
                position.quantity
            }
        };
        if quantity <= Decimal::ZERO {
            bail!("position {} has no sellable quantity", position.id);
        }

        let attempts = match reason {
            ExitReason::StopLoss { stop_price } => {
                self.notifier.alert(&format!(
                    "⛔️ {}: Stoploss triggered: price {} is below {}",
                    pair,
                    format_price(price),
                    format_price(stop_price)
                ));
                self.config.stop_loss_retry_count + 1
            }
            ExitReason::TakeProfit { .. } => 1,
        };

        let order = match self.sell_with_retry(pair, quantity, attempts).await {
            Ok(order) => order,
            Err(e) => {
                self.notifier.alert(&format!(
                    "❌ {}: sell failed after {} attempt(s): {}. Position stays open.",
                    pair, attempts, e
                ));
                return Ok(());
            }
        };

        let closed = self.portfolio.close(pair, position_id)?;
        let dust = closed.quantity - quantity;
        if dust > Decimal::ZERO {
            warn!(
                pair = %pair,
                "{} left unsold below market precision, dropped with position {}",
                dust,
                closed.id
            );
        }
        let sold = Position { quantity, ..closed };
        let fee = to_decimal(self.config.trade_fee_percentage);
        let profit = sold.profit_at(price, fee);
        let profit_pct = sold.profit_pct_at(price, fee);
        self.period.record(profit);
        self.portfolio.set_period(self.period.state().clone());
        self.portfolio.save().await.context("saving portfolio")?;

        self.record_trade(TradeRecord {
            id: order.id,
            pair: pair.to_string(),
            side: Side::Sell,
            price,
            quantity,
            profit: Some(profit),
            reason: Some(reason.label().to_string()),
            demo: self.config.demo_mode,
            timestamp: Utc::now(),
        })
        .await;

        self.notifier.alert(&format!(
            "🔴 {}: SELL ({}) {} @ {} EUR, profit {} EUR ({:.2}%)",
            pair,
            reason.label(),
            quantity,
            format_price(price),
            profit.round_dp(2),
            profit_pct
        ));
        if self.period.buys_paused() {
            info!("🎯 Period target of {} EUR reached, buys paused", self.period.target());
        }
        Ok(())
    }

    async fn sell_with_retry(
        &self,
        pair: &str,
        quantity: Decimal,
        attempts: u32,
    ) -> Result<OrderResponse, ExchangeError> {
        let wait = Duration::from_secs(self.config.stop_loss_wait_time);
        let mut attempt = 1;
        loop {
            match self.execute_order(pair, Side::Sell, quantity).await {
                Ok(order) => return Ok(order),
                Err(e) if attempt < attempts => {
                    warn!(
                        pair = %pair,
                        "Sell attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_order(
        &self,
        pair: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderResponse, ExchangeError> {
        if self.config.demo_mode {
            info!(pair = %pair, "📝 [DEMO] Simulated {} of {}", side, quantity);
            return Ok(OrderResponse {
                id: format!("demo-{}", Uuid::new_v4()),
                pair: pair.to_string(),
                status: "demo".to_string(),
                filled_amount: Some(quantity),
            });
        }
        let order = self.exchange.place_market_order(pair, side, quantity).await?;
        info!(pair = %pair, "✅ Order {} {}: {}", order.id, side, order.status);
        Ok(order)
    }

    async fn record_trade(&self, record: TradeRecord) {
        if let Err(e) = self.journal.append(&record).await {
            error!("❗ Error logging trade: {}", e);
        }
    }

    async fn publish_status(&self) {
        let mut status = self.status.write().await;
        status.profile = self.notifier.bot_name().to_string();
        status.version = VERSION.to_string();
        status.demo_mode = self.config.demo_mode;
        status.started_at = Some(self.started_at);
        status.last_cycle_at = (self.cycles > 0).then(Utc::now);
        status.cycles = self.cycles;
        status.period = Some(self.period.state().clone());
        status.period_ends_at = Some(self.period.ends_at());
        status.daily_target = self.period.target();
        status.buys_paused = self.period.buys_paused();
        status.positions = self.portfolio.all_positions();
        status.pairs = self
            .config
            .pairs
            .iter()
            .filter_map(|pair| self.strategy.snapshot(pair).map(|s| (pair.clone(), s)))
            .collect();
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}
