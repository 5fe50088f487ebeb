use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;
use crate::search::eval::{EvalFeatures, BISHOP, QUEEN, ROOK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticalScanLevel {
    Off,
    Basic,
    Full,
}

/// Blunder-gate strictness. Lower tiers only catch the biggest blunders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl GateTier {
    /// Net material a move may put at risk before it counts as catastrophic.
    pub fn threshold_cp(self) -> i32 {
        match self {
            GateTier::Beginner => QUEEN - 100,
            GateTier::Intermediate => ROOK - 50,
            GateTier::Advanced => BISHOP - 80,
        }
    }

    pub fn rejects_mate_threats(self) -> bool { self != GateTier::Beginner }

    pub fn rejects_stalemates(self) -> bool { self == GateTier::Advanced }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyProfile {
    pub level: u8,
    pub min_depth: u32,
    pub target_depth: u32,
    pub hard_cap_depth: u32,
    pub beam_width: usize,
    /// 0 disables quiescence.
    pub quiescence_max_depth: u32,
    /// 0 disables aspiration windows.
    pub aspiration_window_cp: i32,
    pub tactical_scan_level: TacticalScanLevel,
    pub use_opening_book: bool,
    #[serde(default)]
    pub eval: EvalFeatures,
    pub gate_tier: GateTier,
}

impl DifficultyProfile {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_depth == 0 {
            return Err(EngineError::Config(format!("level {}: minDepth must be >= 1", self.level)));
        }
        if !(self.min_depth <= self.target_depth && self.target_depth <= self.hard_cap_depth) {
            return Err(EngineError::Config(format!(
                "level {}: expected minDepth <= targetDepth <= hardCapDepth, got {}/{}/{}",
                self.level, self.min_depth, self.target_depth, self.hard_cap_depth
            )));
        }
        if self.beam_width == 0 {
            return Err(EngineError::Config(format!("level {}: beamWidth must be >= 1", self.level)));
        }
        if self.aspiration_window_cp < 0 {
            return Err(EngineError::Config(format!("level {}: aspirationWindowCentipawns must be >= 0", self.level)));
        }
        Ok(())
    }
}

/// Read-only level → profile lookup, shared by every request.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileTable {
    profiles: Vec<DifficultyProfile>,
}

impl Default for ProfileTable {
    fn default() -> Self { Self::builtin() }
}

impl ProfileTable {
    pub fn builtin() -> Self {
        let mut light = EvalFeatures::NONE;
        light.development = true;
        light.knight_rim = true;

        let mut medium = light;
        medium.bishop_pair = true;
        medium.rook_open_file = true;
        medium.passed_pawns = true;

        let profiles = vec![
            DifficultyProfile {
                level: 1,
                min_depth: 1,
                target_depth: 2,
                hard_cap_depth: 2,
                beam_width: 5,
                quiescence_max_depth: 0,
                aspiration_window_cp: 0,
                tactical_scan_level: TacticalScanLevel::Off,
                use_opening_book: true,
                eval: EvalFeatures::NONE,
                gate_tier: GateTier::Beginner,
            },
            DifficultyProfile {
                level: 2,
                min_depth: 1,
                target_depth: 2,
                hard_cap_depth: 3,
                beam_width: 4,
                quiescence_max_depth: 2,
                aspiration_window_cp: 0,
                tactical_scan_level: TacticalScanLevel::Basic,
                use_opening_book: true,
                eval: light,
                gate_tier: GateTier::Beginner,
            },
            DifficultyProfile {
                level: 3,
                min_depth: 2,
                target_depth: 3,
                hard_cap_depth: 4,
                beam_width: 3,
                quiescence_max_depth: 4,
                aspiration_window_cp: 0,
                tactical_scan_level: TacticalScanLevel::Basic,
                use_opening_book: true,
                eval: medium,
                gate_tier: GateTier::Intermediate,
            },
            DifficultyProfile {
                level: 4,
                min_depth: 2,
                target_depth: 4,
                hard_cap_depth: 5,
                beam_width: 2,
                quiescence_max_depth: 6,
                aspiration_window_cp: 50,
                tactical_scan_level: TacticalScanLevel::Full,
                use_opening_book: true,
                eval: EvalFeatures::ALL,
                gate_tier: GateTier::Advanced,
            },
            DifficultyProfile {
                level: 5,
                min_depth: 2,
                target_depth: 5,
                hard_cap_depth: 6,
                beam_width: 1,
                quiescence_max_depth: 8,
                aspiration_window_cp: 35,
                tactical_scan_level: TacticalScanLevel::Full,
                use_opening_book: true,
                eval: EvalFeatures::ALL,
                gate_tier: GateTier::Advanced,
            },
        ];
        Self { profiles }
    }

    /// Levels must be unique; they are sorted ascending.
    pub fn from_profiles(mut profiles: Vec<DifficultyProfile>) -> Result<Self, EngineError> {
        if profiles.is_empty() { return Err(EngineError::Config("profile table is empty".to_string())); }
        for p in &profiles { p.validate()?; }
        profiles.sort_by_key(|p| p.level);
        if profiles.windows(2).any(|w| w[0].level == w[1].level) {
            return Err(EngineError::Config("duplicate difficulty level".to_string()));
        }
        Ok(Self { profiles })
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let profiles: Vec<DifficultyProfile> = serde_json::from_str(json)?;
        Self::from_profiles(profiles)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.profiles)?)
    }

    /// Exact match, or the nearest configured level for out-of-range input.
    pub fn resolve(&self, level: i64) -> &DifficultyProfile {
        let lowest = &self.profiles[0];
        let highest = &self.profiles[self.profiles.len() - 1];
        if level <= lowest.level as i64 { return lowest; }
        if level >= highest.level as i64 { return highest; }
        self.profiles
            .iter()
            .min_by_key(|p| (p.level as i64 - level).abs())
            .unwrap_or(lowest)
    }

    pub fn lowest(&self) -> &DifficultyProfile { &self.profiles[0] }

    pub fn highest(&self) -> &DifficultyProfile { &self.profiles[self.profiles.len() - 1] }

    pub fn levels(&self) -> impl Iterator<Item = &DifficultyProfile> { self.profiles.iter() }

    pub fn len(&self) -> usize { self.profiles.len() }

    pub fn is_empty(&self) -> bool { self.profiles.is_empty() }
}
