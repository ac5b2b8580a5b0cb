// Recovery telemetry
//
// Callbacks are advisory; the recoverer ignores what observers do.

use crate::keys::{KeyType, SectorKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttempt {
    pub phase: u8,
    /// 1-based index within the phase
    pub attempt: usize,
    /// Upper bound of attempts in this phase
    pub max_attempts: usize,
    pub sector: u8,
    pub key_type: KeyType,
    pub key: SectorKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFound {
    pub sector: u8,
    pub key_type: KeyType,
    pub key: SectorKey,
    pub complete_sectors: usize,
    pub total_sectors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    pub phase: u8,
    pub complete_sectors: usize,
    pub partial_sectors: usize,
    pub attempts: usize,
}

pub trait BruteForceObserver: Send + Sync {
    fn on_attempt(&self, _attempt: &KeyAttempt) {}

    fn on_key_found(&self, _found: &KeyFound) {}

    fn on_phase_complete(&self, _summary: &PhaseSummary) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl BruteForceObserver for NoopObserver {}
