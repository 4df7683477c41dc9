// src/core/journal.rs
use crate::core::portfolio::write_atomic;
use crate::error::StoreError;
use crate::types::TradeRecord;
use std::path::{Path, PathBuf};

pub const TRADES_FILE: &str = "trades.json";

/// Every fill, kept as one JSON array in `<data-dir>/trades.json`.
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(TRADES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all(&self) -> Result<Vec<TradeRecord>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(Vec::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    pub async fn append(&self, record: &TradeRecord) -> Result<(), StoreError> {
        let mut trades = self.read_all().await?;
        trades.push(record.clone());
        let data = serde_json::to_string_pretty(&trades)?;
        write_atomic(&self.path, data.as_bytes()).await
    }
}
