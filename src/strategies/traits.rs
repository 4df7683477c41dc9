// src/strategies/traits.rs
use crate::types::{Position, Signal, StrategySnapshot, Ticker};
use rust_decimal::Decimal;

/// What the engine knows about a pair besides its price.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub positions: &'a [Position],
    pub atr: Option<f64>,
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Seed the price history (e.g. candle closes, oldest first).
    fn warm_up(&mut self, pair: &str, closes: &[Decimal]);

    /// Process one price observation. No signals means hold.
    fn on_tick(&mut self, ticker: &Ticker, ctx: TickContext<'_>) -> Vec<Signal>;

    fn snapshot(&self, pair: &str) -> Option<StrategySnapshot>;
}
