// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: String,
    pub price: Decimal,
    pub timestamp: i64, // ms
}

/// One OHLCV candle, oldest first when returned in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Trading rules for a single market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub pair: String,
    pub quantity_decimals: u32,
    pub min_order_base: Decimal,
    pub min_order_quote: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub pair: String,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Profit in quote currency if sold at `price`, fee charged on the revenue.
    pub fn profit_at(&self, price: Decimal, fee_percentage: Decimal) -> Decimal {
        let revenue = price * self.quantity * (Decimal::ONE - fee_percentage / Decimal::ONE_HUNDRED);
        revenue - self.cost_basis()
    }

    /// Same as `profit_at`, as a percentage of the cost basis.
    pub fn profit_pct_at(&self, price: Decimal, fee_percentage: Decimal) -> f64 {
        let cost = self.cost_basis();
        if cost.is_zero() {
            return 0.0;
        }
        let pct = self.profit_at(price, fee_percentage) / cost * Decimal::ONE_HUNDRED;
        pct.to_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit { profit_pct: f64 },
    StopLoss { stop_price: Decimal },
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit { .. } => "take_profit",
            ExitReason::StopLoss { .. } => "stop_loss",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Buy { price: Decimal },
    Sell {
        position_id: String,
        price: Decimal,
        reason: ExitReason,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub pair: String,
    pub status: String,
    /// Base amount actually filled, when the exchange reports it.
    pub filled_amount: Option<Decimal>,
}

/// Line in `trades.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub pair: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub profit: Option<Decimal>,
    pub reason: Option<String>,
    #[serde(default)]
    pub demo: bool,
    pub timestamp: DateTime<Utc>,
}

/// Indicator state of one pair after the latest tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategySnapshot {
    pub price: Option<Decimal>,
    pub window_mean: Option<f64>,
    pub change_pct: Option<f64>,
    pub rsi: Option<f64>,
    pub ema: Option<f64>,
    pub samples: usize,
}
