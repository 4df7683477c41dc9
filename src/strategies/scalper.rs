use crate::config::ScalperConfig;
use crate::strategies::indicators::{self, PriceHistory};
use crate::strategies::traits::{Strategy, TickContext};
use crate::types::{ExitReason, Position, Signal, StrategySnapshot, Ticker};
use crate::utils::precision::{to_decimal, to_f64};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Buys dips below the rolling mean, sells on a fee-adjusted profit target,
/// and guards every position with a stop. With an ATR the stop is the tighter
/// of the ATR stop and the fixed STOP_LOSS percentage, so a wide ATR never
/// loosens the stop past STOP_LOSS.
pub struct ScalpingStrategy {
    config: ScalperConfig,
    fee_percentage: Decimal,
    capacity: usize,
    histories: HashMap<String, PriceHistory>,
    snapshots: HashMap<String, StrategySnapshot>,
}

impl ScalpingStrategy {
    pub fn new(config: ScalperConfig) -> Self {
        Self {
            fee_percentage: to_decimal(config.trade_fee_percentage),
            capacity: config.history_capacity(),
            config,
            histories: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    /// Stop price of a position: `max(entry - ATR * multiplier, entry * (1 + STOP_LOSS/100))`.
    pub fn stop_price(&self, position: &Position, atr: Option<f64>) -> Decimal {
        let fixed = position.entry_price
            * (Decimal::ONE + to_decimal(self.config.stop_loss) / Decimal::ONE_HUNDRED);
        match atr {
            Some(atr) => {
                let dynamic = position.entry_price - to_decimal(atr * self.config.atr_multiplier);
                dynamic.max(fixed)
            }
            None => fixed,
        }
    }

    fn history_mut(&mut self, pair: &str) -> &mut PriceHistory {
        let capacity = self.capacity;
        self.histories
            .entry(pair.to_string())
            .or_insert_with(|| PriceHistory::new(capacity))
    }

    fn compute_snapshot(&self, history: &PriceHistory, price: Decimal) -> StrategySnapshot {
        let all = history.all();
        let window_mean = history
            .last_n(self.config.window_size)
            .and_then(|window| indicators::mean(&window));
        let change_pct = window_mean
            .filter(|mean| *mean > 0.0)
            .map(|mean| (to_f64(price) - mean) / mean * 100.0);

        StrategySnapshot {
            price: Some(price),
            window_mean,
            change_pct,
            rsi: indicators::rsi(&all, self.config.rsi_points),
            ema: if self.config.use_ema {
                indicators::ema(&all, self.config.ema_period())
            } else {
                None
            },
            samples: history.len(),
        }
    }

    fn rsi_allows_exit(&self, snapshot: &StrategySnapshot) -> bool {
        if !self.config.use_rsi {
            return true;
        }
        matches!(snapshot.rsi, Some(rsi) if rsi >= self.config.rsi_sell_threshold)
    }

    fn entry_allowed(&self, snapshot: &StrategySnapshot) -> bool {
        let Some(change_pct) = snapshot.change_pct else {
            return false;
        };
        if change_pct > -self.config.threshold_buy.abs() {
            return false;
        }
        if self.config.use_rsi {
            match snapshot.rsi {
                Some(rsi) if rsi <= self.config.rsi_buy_threshold => {}
                _ => return false,
            }
        }
        if self.config.use_ema {
            let price = snapshot.price.map(to_f64).unwrap_or(0.0);
            match snapshot.ema {
                Some(ema) if price > ema => {}
                _ => return false,
            }
        }
        true
    }
}

impl Strategy for ScalpingStrategy {
    fn name(&self) -> &str {
        "scalper"
    }

    fn warm_up(&mut self, pair: &str, closes: &[Decimal]) {
        let history = self.history_mut(pair);
        history.extend(closes.iter().map(|c| to_f64(*c)));
    }

    fn on_tick(&mut self, ticker: &Ticker, ctx: TickContext<'_>) -> Vec<Signal> {
        let price = ticker.price;
        self.history_mut(&ticker.pair).push(to_f64(price));
        let snapshot = match self.histories.get(&ticker.pair) {
            Some(history) => self.compute_snapshot(history, price),
            None => StrategySnapshot::default(),
        };

        let mut signals = Vec::new();
        let mut still_open = 0usize;

        for position in ctx.positions {
            let stop_price = self.stop_price(position, ctx.atr);
            if price <= stop_price {
                signals.push(Signal::Sell {
                    position_id: position.id.clone(),
                    price,
                    reason: ExitReason::StopLoss { stop_price },
                });
                continue;
            }

            let profit_pct = position.profit_pct_at(price, self.fee_percentage);
            if profit_pct >= self.config.threshold_sell && self.rsi_allows_exit(&snapshot) {
                signals.push(Signal::Sell {
                    position_id: position.id.clone(),
                    price,
                    reason: ExitReason::TakeProfit { profit_pct },
                });
                continue;
            }
            still_open += 1;
        }

        if still_open < self.config.max_trades_per_pair && self.entry_allowed(&snapshot) {
            signals.push(Signal::Buy { price });
        }

        debug!(
            pair = %ticker.pair,
            samples = snapshot.samples,
            change_pct = ?snapshot.change_pct,
            rsi = ?snapshot.rsi,
            signals = signals.len(),
            "tick evaluated"
        );
        self.snapshots.insert(ticker.pair.clone(), snapshot);
        signals
    }

    fn snapshot(&self, pair: &str) -> Option<StrategySnapshot> {
        self.snapshots.get(pair).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn config() -> ScalperConfig {
        ScalperConfig::from_json(
            r#"{
                "PAIRS": ["BTC-EUR"],
                "TOTAL_BUDGET": 1000,
                "DAILY_TARGET": 10,
                "TRADING_PERIOD_HOURS": 24,
                "CHECK_INTERVAL": 5,
                "WINDOW_SIZE": 5,
                "TRADE_FEE_PERCENTAGE": 0.25,
                "STOP_LOSS_RETRY_COUNT": 2,
                "STOP_LOSS": -3,
                "THRESHOLD_BUY": 1.0,
                "THRESHOLD_SELL": 1.0,
                "DEMO_MODE": true,
                "USE_RSI": false
            }"#,
        )
        .unwrap()
    }

    fn position(entry: Decimal) -> Position {
        Position {
            id: "pos-1".into(),
            pair: "BTC-EUR".into(),
            entry_price: entry,
            quantity: dec!(1),
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn atr_stop_never_looser_than_fixed_stop() {
        let strategy = ScalpingStrategy::new(config());
        let pos = position(dec!(100));
        // fixed stop 97; ATR 10 * 1.5 gives 85, so the fixed stop wins
        assert_eq!(strategy.stop_price(&pos, Some(10.0)), dec!(97));
        // ATR 1 * 1.5 gives 98.5, tighter than 97
        assert_eq!(strategy.stop_price(&pos, Some(1.0)), dec!(98.5));
        assert_eq!(strategy.stop_price(&pos, None), dec!(97));
    }

    #[test]
    fn stop_loss_and_take_profit_are_exclusive() {
        let mut strategy = ScalpingStrategy::new(config());
        let positions = vec![position(dec!(100))];
        let ticker = Ticker {
            pair: "BTC-EUR".into(),
            price: dec!(96),
            timestamp: 0,
        };
        let signals = strategy.on_tick(
            &ticker,
            TickContext {
                positions: &positions,
                atr: None,
            },
        );
        assert_eq!(signals.len(), 1);
        assert!(matches!(
            &signals[0],
            Signal::Sell { reason: ExitReason::StopLoss { .. }, .. }
        ));
    }
}
