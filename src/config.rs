use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::book::DEFAULT_PLY_THRESHOLD;
use crate::error::EngineError;
use crate::search::clock::DEFAULT_SLICE;
use crate::search::difficulty::ProfileTable;
use crate::search::tactics::DEFAULT_SCAN_BUDGET;

/// Host-level settings. Every field has a default, so `{}` is a valid file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Added to each request's budget for the host's outer timeout.
    pub grace_ms: u64,
    pub slice_ms: u64,
    pub tactical_budget_ms: u64,
    /// 0 uses rayon's default (one per core).
    pub worker_threads: usize,
    pub book_ply_threshold: u32,
    /// Optional JSON file replacing the built-in difficulty table.
    pub profiles: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_ms: 300,
            slice_ms: DEFAULT_SLICE.as_millis() as u64,
            tactical_budget_ms: DEFAULT_SCAN_BUDGET.as_millis() as u64,
            worker_threads: 0,
            book_ply_threshold: DEFAULT_PLY_THRESHOLD,
            profiles: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.slice_ms == 0 { return Err(EngineError::Config("sliceMs must be >= 1".to_string())); }
        Ok(())
    }

    pub fn grace(&self) -> Duration { Duration::from_millis(self.grace_ms) }

    pub fn slice(&self) -> Duration { Duration::from_millis(self.slice_ms) }

    pub fn tactical_budget(&self) -> Duration { Duration::from_millis(self.tactical_budget_ms) }

    /// The configured profile file, or the built-in table.
    pub fn profile_table(&self) -> Result<ProfileTable, EngineError> {
        match &self.profiles {
            Some(path) => ProfileTable::load(path),
            None => Ok(ProfileTable::builtin()),
        }
    }
}
