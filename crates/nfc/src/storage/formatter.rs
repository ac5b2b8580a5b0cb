// Tag formatter
//
// Wipes data blocks and installs production trailers on every sector whose
// keys were recovered. Sector 0 block 0 and trailers are never cleared.

use crate::codec::sector::sector_range;
use crate::codec::SectorTrailer;
use crate::error::{NfcError, Result};
use crate::keys::{SectorKey, SectorKeys, TagKeyMap};
use crate::transport::TagTransport;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    pub formatted: Vec<u8>,
    pub failed: Vec<(u8, NfcError)>,
    /// Keys valid after formatting
    pub keys: TagKeyMap,
}

pub async fn format_tag(
    transport: &dyn TagTransport,
    recovered: &TagKeyMap,
    key_a: SectorKey,
    key_b: SectorKey,
) -> Result<FormatReport> {
    let trailer = SectorTrailer::production(key_a, key_b);
    let mut report = FormatReport::default();

    for (&sector, &keys) in recovered {
        if keys.is_empty() {
            report.failed.push((sector, NfcError::NotAuthenticated));
            report.keys.insert(sector, keys);
            continue;
        }
        match format_sector(transport, sector, keys, trailer).await {
            Ok(()) => {
                report.formatted.push(sector);
                report.keys.insert(sector, SectorKeys::both(key_a, key_b));
            }
            Err(e) => {
                warn!(sector, error = %e, "Sector format failed");
                report.failed.push((sector, e));
                report.keys.insert(sector, keys);
            }
        }
    }

    if report.formatted.is_empty() {
        let first_write_error = report
            .failed
            .iter()
            .map(|(_, e)| e.clone())
            .find(|e| matches!(e, NfcError::WriteFailed { .. }));
        return Err(first_write_error.unwrap_or(NfcError::WriteFailed { sector: 0, block: 0 }));
    }

    info!(
        formatted = report.formatted.len(),
        failed = report.failed.len(),
        "Tag formatted"
    );
    Ok(report)
}

async fn format_sector(
    transport: &dyn TagTransport,
    sector: u8,
    keys: SectorKeys,
    trailer: SectorTrailer,
) -> Result<()> {
    let range = sector_range(sector);
    for block in 0..range.data_block_count() {
        if sector == 0 && block == 0 {
            continue;
        }
        if !transport.clear_data_block(sector, block, keys).await {
            return Err(NfcError::WriteFailed { sector, block });
        }
    }
    if !transport.write_sector_trailer(sector, trailer, keys).await {
        return Err(NfcError::WriteFailed {
            sector,
            block: range.trailer_offset(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyType;
    use crate::transport::SimulatedTag;

    const UID: [u8; 4] = [9, 9, 9, 9];

    fn production() -> (SectorKey, SectorKey) {
        (
            SectorKey::new([0x11; 6]),
            SectorKey::new([0x22; 6]),
        )
    }

    fn factory_map(sectors: u8) -> TagKeyMap {
        (0..sectors)
            .map(|s| (s, SectorKeys::both(SectorKey::DEFAULT, SectorKey::DEFAULT)))
            .collect()
    }

    #[tokio::test]
    async fn test_format_factory_tag() {
        let tag = SimulatedTag::classic_1k(UID);
        let defaults = SectorKeys::both(SectorKey::DEFAULT, SectorKey::DEFAULT);
        assert!(tag.write_block(0, 1, [5u8; 16], defaults).await);
        assert!(tag.write_block(4, 2, [5u8; 16], defaults).await);
        let (key_a, key_b) = production();

        let report = format_tag(&tag, &factory_map(16), key_a, key_b).await.unwrap();

        assert_eq!(report.formatted.len(), 16);
        assert!(report.failed.is_empty());
        assert_eq!(tag.raw_block(0, 1), Some([0u8; 16]));
        assert_eq!(tag.raw_block(4, 2), Some([0u8; 16]));
        assert_eq!(&tag.raw_block(0, 0).unwrap()[..4], &UID);
        assert_eq!(tag.trailer(9), Some(SectorTrailer::production(key_a, key_b)));
        assert!(tag.authenticate(9, KeyType::B, key_b).await);
        assert_eq!(report.keys[&9], SectorKeys::both(key_a, key_b));
    }

    #[tokio::test]
    async fn test_partial_failures_are_collected() {
        let (key_a, key_b) = production();
        let tag = SimulatedTag::classic_1k(UID);
        let mut keys = factory_map(3);
        keys.insert(1, SectorKeys::default());
        keys.insert(
            2,
            SectorKeys {
                key_a: Some(SectorKey::new([0x33; 6])),
                key_b: None,
            },
        );

        let report = format_tag(&tag, &keys, key_a, key_b).await.unwrap();

        assert_eq!(report.formatted, vec![0]);
        assert_eq!(report.failed[0], (1, NfcError::NotAuthenticated));
        assert_eq!(report.failed[1], (2, NfcError::WriteFailed { sector: 2, block: 0 }));
        assert_eq!(tag.trailer(2), Some(SectorTrailer::transport()));
    }

    #[tokio::test]
    async fn test_nothing_formatted_is_write_error() {
        let (key_a, key_b) = production();
        let tag = SimulatedTag::classic_1k(UID);
        tag.set_fail_writes(true);

        let err = format_tag(&tag, &factory_map(2), key_a, key_b).await.unwrap_err();
        assert_eq!(err, NfcError::WriteFailed { sector: 0, block: 1 });
    }
}
