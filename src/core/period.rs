// src/core/period.rs
use crate::utils::precision::to_decimal;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodState {
    pub started_at: DateTime<Utc>,
    pub realized_profit: Decimal,
    pub trades: u32,
}

impl PeriodState {
    fn starting(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            realized_profit: Decimal::ZERO,
            trades: 0,
        }
    }
}

/// Realized profit over a TRADING_PERIOD_HOURS window. Once it reaches
/// DAILY_TARGET, new entries pause until the window rolls over; exits keep
/// running.
#[derive(Debug, Clone)]
pub struct PeriodTracker {
    length: Duration,
    target: Decimal,
    state: PeriodState,
}

impl PeriodTracker {
    pub fn new(
        period_hours: f64,
        daily_target: f64,
        restored: Option<PeriodState>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            length: Duration::milliseconds((period_hours * 3_600_000.0).round() as i64),
            target: to_decimal(daily_target),
            state: restored.unwrap_or_else(|| PeriodState::starting(now)),
        }
    }

    /// Starts a new period when the current one has elapsed and returns the
    /// finished one.
    pub fn roll(&mut self, now: DateTime<Utc>) -> Option<PeriodState> {
        if now - self.state.started_at < self.length {
            return None;
        }
        Some(std::mem::replace(&mut self.state, PeriodState::starting(now)))
    }

    pub fn record(&mut self, profit: Decimal) {
        self.state.realized_profit += profit;
        self.state.trades += 1;
    }

    pub fn buys_paused(&self) -> bool {
        self.state.realized_profit >= self.target
    }

    pub fn target(&self) -> Decimal {
        self.target
    }

    pub fn state(&self) -> &PeriodState {
        &self.state
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.state.started_at + self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn target_pauses_buys_until_rollover() {
        let mut tracker = PeriodTracker::new(6.0, 10.0, None, at(0));
        tracker.record(dec!(4));
        assert!(!tracker.buys_paused());
        tracker.record(dec!(6.5));
        assert!(tracker.buys_paused());

        assert!(tracker.roll(at(5)).is_none());
        assert!(tracker.buys_paused());

        let finished = tracker.roll(at(6)).unwrap();
        assert_eq!(finished.realized_profit, dec!(10.5));
        assert_eq!(finished.trades, 2);
        assert!(!tracker.buys_paused());
        assert_eq!(tracker.state().started_at, at(6));
    }

    #[test]
    fn losses_count_against_the_target() {
        let mut tracker = PeriodTracker::new(24.0, 5.0, None, at(0));
        tracker.record(dec!(6));
        tracker.record(dec!(-2));
        assert!(!tracker.buys_paused());
    }

    #[test]
    fn restored_state_is_kept() {
        let restored = PeriodState {
            started_at: at(1),
            realized_profit: dec!(3),
            trades: 1,
        };
        let tracker = PeriodTracker::new(24.0, 5.0, Some(restored.clone()), at(2));
        assert_eq!(tracker.state(), &restored);
        assert_eq!(tracker.ends_at(), at(1) + Duration::hours(24));
    }
}
