use crate::core::period::PeriodState;
use crate::types::{Position, StrategySnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What `/status` reports. Published by the engine after every cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub profile: String,
    pub version: String,
    pub demo_mode: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub period: Option<PeriodState>,
    pub period_ends_at: Option<DateTime<Utc>>,
    pub daily_target: Decimal,
    pub buys_paused: bool,
    pub positions: Vec<Position>,
    pub pairs: BTreeMap<String, StrategySnapshot>,
}

pub type SharedStatus = Arc<RwLock<StatusSnapshot>>;

pub fn shared_status() -> SharedStatus {
    Arc::new(RwLock::new(StatusSnapshot::default()))
}
