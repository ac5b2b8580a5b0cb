// Recovery configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_SECTORS: u8 = 16;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

/// How far beyond the owned keys the search goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BruteForceMode {
    /// Owned keys only
    None,
    /// Owned keys, then the short list of common keys
    #[default]
    MostLikely,
    /// Owned keys, common keys, then the whole dictionary
    Full,
}

impl BruteForceMode {
    pub fn default_phase_two(self) -> PhaseTwoPolicy {
        match self {
            BruteForceMode::None => PhaseTwoPolicy::Skip,
            BruteForceMode::MostLikely => PhaseTwoPolicy::Retry,
            BruteForceMode::Full => PhaseTwoPolicy::RemainingDictionary,
        }
    }
}

/// Second pass over sectors left incomplete by phase 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseTwoPolicy {
    Skip,
    /// Phase-1 list again, keys that already opened a sector first
    Retry,
    /// Dictionary keys phase 1 did not try
    RemainingDictionary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BruteForceConfig {
    pub max_sectors: u8,
    /// Presence check timeout before each attempt
    pub attempt_timeout: Duration,
    pub mode: BruteForceMode,
    /// Derived from `mode` when absent
    pub phase_two: Option<PhaseTwoPolicy>,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            max_sectors: DEFAULT_MAX_SECTORS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            mode: BruteForceMode::default(),
            phase_two: None,
        }
    }
}

impl BruteForceConfig {
    pub fn with_mode(mut self, mode: BruteForceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn phase_two_policy(&self) -> PhaseTwoPolicy {
        self.phase_two.unwrap_or_else(|| self.mode.default_phase_two())
    }
}
