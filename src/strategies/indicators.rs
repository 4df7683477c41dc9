// src/strategies/indicators.rs
use crate::types::Candle;
use crate::utils::precision::to_f64;
use std::collections::VecDeque;
use ta::indicators::{AverageTrueRange, ExponentialMovingAverage, RelativeStrengthIndex};
use ta::{Close, High, Low, Next};

/// Bounded price history of one pair, oldest first.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, price: f64) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub fn extend(&mut self, prices: impl IntoIterator<Item = f64>) {
        for price in prices {
            self.push(price);
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Last `n` prices, or `None` while fewer are known.
    pub fn last_n(&self, n: usize) -> Option<Vec<f64>> {
        if n == 0 || self.prices.len() < n {
            return None;
        }
        Some(self.prices.iter().skip(self.prices.len() - n).copied().collect())
    }

    pub fn all(&self) -> Vec<f64> {
        self.prices.iter().copied().collect()
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// RSI of the last value. Needs `period + 1` prices.
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period + 1 {
        return None;
    }
    let mut indicator = RelativeStrengthIndex::new(period).ok()?;
    prices.iter().map(|p| indicator.next(*p)).last()
}

/// EMA of the last value. Needs `period` prices.
pub fn ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let mut indicator = ExponentialMovingAverage::new(period).ok()?;
    prices.iter().map(|p| indicator.next(*p)).last()
}

struct Bar {
    high: f64,
    low: f64,
    close: f64,
}

impl High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

/// Average True Range over candles (oldest first). Needs `period + 1` candles.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }
    let mut indicator = AverageTrueRange::new(period).ok()?;
    candles
        .iter()
        .map(|c| Bar {
            high: to_f64(c.high),
            low: to_f64(c.low),
            close: to_f64(c.close),
        })
        .map(|bar| indicator.next(&bar))
        .last()
        .filter(|value| value.is_finite() && *value > 0.0)
}
