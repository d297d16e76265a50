//! Per-IO time series
//!
//! Append-only `(time, value)` pairs in write order. Writing a time that is
//! already stored keeps the first entry and reports `AlreadyStored`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use isl_core::log::msg;
use isl_core::{IslError, IslResult, Value};

/// One stored sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub time: f64,
    pub value: Value,
}

/// Append-only time series
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Store {
    entries: Vec<StoreEntry>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Append `value` at `time`
    pub fn append(&mut self, time: f64, value: Value) -> IslResult<()> {
        if self.entries.iter().rev().any(|e| e.time == time) {
            tracing::debug!(msg_id = msg::DATA_STORE_DUPLICATE, time, "time already stored");
            return Err(IslError::AlreadyStored(time));
        }
        self.entries.push(StoreEntry { time, value });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    /// Latest entry written at or before `time`
    pub fn at_or_before(&self, time: f64) -> Option<&StoreEntry> {
        self.entries
            .iter()
            .filter(|e| e.time <= time)
            .max_by(|a, b| a.time.total_cmp(&b.time))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Write the series as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> IslResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self).map_err(|e| IslError::SaveError(e.to_string()))?;
        fs::write(path, json)?;
        tracing::info!(
            msg_id = msg::DATA_STORE_FLUSH,
            path = %path.display(),
            entries = self.entries.len(),
            "store saved"
        );
        Ok(())
    }

    /// Read a series written by [`Store::save`]
    pub fn load(path: impl AsRef<Path>) -> IslResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| IslError::LoadError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| IslError::LoadError(format!("{}: {}", path.display(), e)))
    }
}
