// src/core/portfolio.rs
use crate::core::period::PeriodState;
use crate::error::StoreError;
use crate::types::Position;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const PORTFOLIO_FILE: &str = "portfolio.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    #[serde(default)]
    pub positions: BTreeMap<String, Vec<Position>>,
    #[serde(default)]
    pub period: Option<PeriodState>,
}

/// Open positions per pair, persisted to `<data-dir>/portfolio.json` after
/// every change so a restarted pod resumes where it stopped.
pub struct PortfolioStore {
    path: PathBuf,
    state: PortfolioState,
}

impl PortfolioStore {
    /// Missing file starts empty. A corrupt file is moved aside, never overwritten.
    pub async fn load(data_dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| StoreError::io(data_dir, e))?;
        let path = data_dir.join(PORTFOLIO_FILE);

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<PortfolioState>(&data) {
                Ok(state) => {
                    info!(
                        "📂 Portfolio restored: {} open positions",
                        state.positions.values().map(Vec::len).sum::<usize>()
                    );
                    state
                }
                Err(e) => {
                    let backup = path.with_extension(format!("corrupt-{}", Utc::now().timestamp()));
                    warn!(
                        "❌ Portfolio file is invalid ({}), moving it to {}",
                        e,
                        backup.display()
                    );
                    tokio::fs::rename(&path, &backup)
                        .await
                        .map_err(|e| StoreError::io(&path, e))?;
                    PortfolioState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("ℹ️ No portfolio file found. Starting with an empty portfolio.");
                PortfolioState::default()
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_positions(&self, pair: &str) -> &[Position] {
        self.state
            .positions
            .get(pair)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_positions(&self) -> Vec<Position> {
        self.state.positions.values().flatten().cloned().collect()
    }

    pub fn position(&self, pair: &str, id: &str) -> Option<&Position> {
        self.open_positions(pair).iter().find(|p| p.id == id)
    }

    pub fn open(&mut self, position: Position) {
        self.state
            .positions
            .entry(position.pair.clone())
            .or_default()
            .push(position);
    }

    pub fn close(&mut self, pair: &str, id: &str) -> Result<Position, StoreError> {
        let positions = self
            .state
            .positions
            .get_mut(pair)
            .ok_or_else(|| StoreError::UnknownPosition(id.to_string()))?;
        let index = positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::UnknownPosition(id.to_string()))?;
        let position = positions.remove(index);
        if positions.is_empty() {
            self.state.positions.remove(pair);
        }
        Ok(position)
    }

    pub fn period(&self) -> Option<&PeriodState> {
        self.state.period.as_ref()
    }

    pub fn set_period(&mut self, period: PeriodState) {
        self.state.period = Some(period);
    }

    /// Write to a temp file, then rename over the old one.
    pub async fn save(&self) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(&self.state)?;
        write_atomic(&self.path, data.as_bytes()).await
    }
}

pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
