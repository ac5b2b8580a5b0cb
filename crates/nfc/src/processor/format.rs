// Tag format: recover keys, wipe data, install production trailers

use super::{NfcChannels, NfcEvent, NfcOutput, NfcProcessor};
use crate::brute_force::{BruteForceMode, BruteForceObserver, KeyFound};
use crate::error::{NfcError, Result};
use crate::keys::TagKeyMap;
use crate::storage::formatter::format_tag;
use tracing::{info, warn};

/// Forwards recovered keys to the processor event stream
struct KeyFoundEvents<'a> {
    channels: &'a NfcChannels,
}

impl BruteForceObserver for KeyFoundEvents<'_> {
    fn on_key_found(&self, found: &KeyFound) {
        self.channels.emit(NfcEvent::KeyFound {
            sector: found.sector,
            key_type: found.key_type,
            complete_sectors: found.complete_sectors,
            total_sectors: found.total_sectors,
        });
    }
}

impl NfcProcessor {
    pub(super) async fn format(&self, mode: BruteForceMode) -> Result<NfcOutput> {
        self.detect().await?;
        let owned = self.request_keys().await?;
        let (Some(key_a), Some(key_b)) = (owned.key_a, owned.key_b) else {
            return Err(NfcError::MissingKeys);
        };
        self.check_aborted()?;

        self.channels.emit(NfcEvent::AuthenticatingSectors);
        let config = self.config.brute_force.clone().with_mode(mode);
        let observer = KeyFoundEvents {
            channels: &self.channels,
        };
        let result = self
            .recovery
            .recover_with(&config, &[key_a, key_b], &observer)
            .await?;
        if result.was_aborted {
            return Err(NfcError::Aborted);
        }
        let recovered = result.into_authenticated()?;

        self.channels.emit(NfcEvent::ValidatingSectorKeys);
        let validated = self.validate_keys(recovered).await;

        self.channels.emit(NfcEvent::FormattingTag);
        let report = format_tag(self.transport.as_ref(), &validated, key_a, key_b).await?;

        Ok(NfcOutput::Formatted {
            formatted_sectors: report.formatted,
            failed_sectors: report.failed.iter().map(|(sector, _)| *sector).collect(),
        })
    }

    /// Drop keys of complete sectors whose trailer cannot be read back
    async fn validate_keys(&self, mut keys: TagKeyMap) -> TagKeyMap {
        for (&sector, sector_keys) in keys.iter_mut() {
            if !sector_keys.is_complete() {
                continue;
            }
            if self
                .transport
                .read_sector_trailer(sector, *sector_keys)
                .await
                .is_none()
            {
                warn!(sector, "Recovered keys failed validation");
                *sector_keys = Default::default();
            }
        }
        info!(
            complete = keys.values().filter(|k| k.is_complete()).count(),
            "Sector keys validated"
        );
        keys
    }
}
