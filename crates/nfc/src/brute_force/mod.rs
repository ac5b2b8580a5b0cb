// Sector Key Recovery
//
// Key-major trial authentication in two phases. Owned keys always go first,
// then the generic candidates chosen by the mode. An abort flag is checked
// before every attempt and the tag must still be in the field.

pub mod config;
pub mod dictionary;
pub mod observer;
pub mod result;

pub use config::{BruteForceConfig, BruteForceMode, PhaseTwoPolicy};
pub use observer::{BruteForceObserver, KeyAttempt, KeyFound, NoopObserver, PhaseSummary};
pub use result::BruteForceResult;

use crate::error::{NfcError, Result};
use crate::keys::{KeyType, SectorKey, SectorKeys, TagKeyMap};
use crate::transport::TagTransport;
use dictionary::{extend_unique, DICTIONARY, STANDARD_KEYS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cancels a running recovery from another task
#[derive(Clone)]
pub struct RecoveryAbortHandle {
    aborted: Arc<AtomicBool>,
    transport: Arc<dyn TagTransport>,
}

impl RecoveryAbortHandle {
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.transport.abort_detection();
    }
}

pub struct SectorKeyRecovery {
    transport: Arc<dyn TagTransport>,
    config: BruteForceConfig,
    aborted: Arc<AtomicBool>,
}

impl SectorKeyRecovery {
    pub fn new(transport: Arc<dyn TagTransport>, config: BruteForceConfig) -> Self {
        Self {
            transport,
            config,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &BruteForceConfig {
        &self.config
    }

    pub fn abort_handle(&self) -> RecoveryAbortHandle {
        RecoveryAbortHandle {
            aborted: Arc::clone(&self.aborted),
            transport: Arc::clone(&self.transport),
        }
    }

    pub fn abort(&self) {
        self.abort_handle().abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Recover keys with the configured mode
    pub async fn recover(
        &self,
        owned: &[SectorKey],
        observer: &dyn BruteForceObserver,
    ) -> Result<BruteForceResult> {
        self.recover_with(&self.config, owned, observer).await
    }

    /// Recover keys for sectors `0..config.max_sectors`.
    ///
    /// On abort the keys found so far are returned with `was_aborted` set.
    /// A tag leaving the field fails with `TagNotFound`.
    pub async fn recover_with(
        &self,
        config: &BruteForceConfig,
        owned: &[SectorKey],
        observer: &dyn BruteForceObserver,
    ) -> Result<BruteForceResult> {
        self.aborted.store(false, Ordering::SeqCst);

        let mut result = BruteForceResult {
            keys: (0..config.max_sectors)
                .map(|sector| (sector, SectorKeys::default()))
                .collect(),
            ..Default::default()
        };

        let mut phase_one = Vec::new();
        extend_unique(&mut phase_one, owned.iter().copied());
        if config.mode != BruteForceMode::None {
            extend_unique(&mut phase_one, STANDARD_KEYS);
        }

        info!(
            mode = ?config.mode,
            sectors = config.max_sectors,
            candidates = phase_one.len(),
            "Starting sector key recovery"
        );

        result.phase_one_attempts = self
            .run_phase(1, &phase_one, config, &mut result.keys, observer)
            .await?;
        observer.on_phase_complete(&summary(1, &result.keys, result.phase_one_attempts));

        let incomplete = result.keys.values().any(|k| !k.is_complete());
        if incomplete && !self.is_aborted() {
            let phase_two = phase_two_keys(config.phase_two_policy(), owned, &phase_one, &result.keys);
            if !phase_two.is_empty() {
                result.phase_two_attempts = self
                    .run_phase(2, &phase_two, config, &mut result.keys, observer)
                    .await?;
                observer.on_phase_complete(&summary(2, &result.keys, result.phase_two_attempts));
            }
        }

        result.total_attempts = result.phase_one_attempts + result.phase_two_attempts;
        result.was_aborted = self.is_aborted();

        info!(
            complete = result.complete_sectors(),
            partial = result.partial_sectors(),
            attempts = result.total_attempts,
            aborted = result.was_aborted,
            "Sector key recovery finished"
        );
        Ok(result)
    }

    async fn run_phase(
        &self,
        phase: u8,
        candidates: &[SectorKey],
        config: &BruteForceConfig,
        keys: &mut TagKeyMap,
        observer: &dyn BruteForceObserver,
    ) -> Result<usize> {
        let sectors: Vec<u8> = keys
            .iter()
            .filter(|(_, k)| !k.is_complete())
            .map(|(sector, _)| *sector)
            .collect();
        let max_attempts = candidates.len() * sectors.len() * KeyType::BOTH.len();
        let total_sectors = keys.len();
        let mut attempts = 0;

        'candidates: for &key in candidates {
            for &sector in &sectors {
                for key_type in KeyType::BOTH {
                    if keys.get(&sector).and_then(|k| k.get(key_type)).is_some() {
                        continue;
                    }
                    if self.is_aborted() {
                        info!(phase, attempts, "Sector key recovery aborted");
                        break 'candidates;
                    }
                    if self.transport.detect_tag(config.attempt_timeout).await.is_none() {
                        if self.is_aborted() {
                            break 'candidates;
                        }
                        warn!(phase, sector, "Tag left the field during recovery");
                        return Err(NfcError::TagNotFound);
                    }

                    attempts += 1;
                    observer.on_attempt(&KeyAttempt {
                        phase,
                        attempt: attempts,
                        max_attempts,
                        sector,
                        key_type,
                        key,
                    });
                    debug!(phase, sector, key_type = %key_type, attempt = attempts, "Trying key");

                    if self.transport.authenticate(sector, key_type, key).await {
                        if let Some(slot) = keys.get_mut(&sector) {
                            slot.set(key_type, key);
                        }
                        let complete_sectors = keys.values().filter(|k| k.is_complete()).count();
                        debug!(sector, key_type = %key_type, complete_sectors, "Sector key found");
                        observer.on_key_found(&KeyFound {
                            sector,
                            key_type,
                            key,
                            complete_sectors,
                            total_sectors,
                        });
                    }
                }
            }

            if keys.values().all(|k| k.is_complete()) {
                break;
            }
        }

        Ok(attempts)
    }
}

fn summary(phase: u8, keys: &TagKeyMap, attempts: usize) -> PhaseSummary {
    PhaseSummary {
        phase,
        complete_sectors: keys.values().filter(|k| k.is_complete()).count(),
        partial_sectors: keys.values().filter(|k| k.is_partial()).count(),
        attempts,
    }
}

/// Candidate order for the second pass; owned keys always lead
fn phase_two_keys(
    policy: PhaseTwoPolicy,
    owned: &[SectorKey],
    phase_one: &[SectorKey],
    found: &TagKeyMap,
) -> Vec<SectorKey> {
    let mut keys = Vec::new();
    match policy {
        PhaseTwoPolicy::Skip => {}
        PhaseTwoPolicy::Retry => {
            extend_unique(&mut keys, owned.iter().copied());
            extend_unique(
                &mut keys,
                found
                    .values()
                    .flat_map(|k| [k.key_a, k.key_b])
                    .flatten(),
            );
            extend_unique(&mut keys, phase_one.iter().copied());
        }
        PhaseTwoPolicy::RemainingDictionary => {
            extend_unique(&mut keys, owned.iter().copied());
            extend_unique(
                &mut keys,
                DICTIONARY.into_iter().filter(|k| !phase_one.contains(k)),
            );
        }
    }
    keys
}
