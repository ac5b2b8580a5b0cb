// Hardware Transport Port (Interface)
//
// Vendor SDKs live behind this trait; codecs, recovery and processors only
// ever talk to it.

pub mod simulated;

use crate::codec::sector::{is_trailer, sector_range};
use crate::codec::{Block, SectorTrailer};
use crate::keys::{KeyType, SectorKey, SectorKeys};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::warn;

pub use simulated::SimulatedTag;

/// Tag UID as reported by the reader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagId(pub Vec<u8>);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// MIFARE Classic reader.
///
/// Implementations:
/// - SimulatedTag: in-memory card with per-sector keys
/// - vendor adapters in the application shell
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagTransport: Send + Sync {
    /// Wait up to `timeout` for a tag in the field
    async fn detect_tag(&self, timeout: Duration) -> Option<TagId>;

    /// Make a running `detect_tag` give up early
    fn abort_detection(&self);

    /// Trial authentication of one key slot
    async fn authenticate(&self, sector: u8, key_type: KeyType, key: SectorKey) -> bool;

    /// Read one block (`block` is relative to the sector), trying key A then key B
    async fn read_block(&self, sector: u8, block: u8, keys: SectorKeys) -> Option<Block>;

    async fn write_block(&self, sector: u8, block: u8, data: Block, keys: SectorKeys) -> bool;

    async fn read_sector_trailer(&self, sector: u8, keys: SectorKeys) -> Option<SectorTrailer> {
        let block = sector_range(sector).trailer_offset();
        let data = self.read_block(sector, block, keys).await?;
        SectorTrailer::decode(&data)
    }

    async fn write_sector_trailer(
        &self,
        sector: u8,
        trailer: SectorTrailer,
        keys: SectorKeys,
    ) -> bool {
        let block = sector_range(sector).trailer_offset();
        self.write_block(sector, block, trailer.encode(), keys).await
    }

    /// Zero a data block. Trailers are refused.
    async fn clear_data_block(&self, sector: u8, block: u8, keys: SectorKeys) -> bool {
        if is_trailer(sector, block) {
            warn!(sector, block, "Refusing to clear sector trailer");
            return false;
        }
        self.write_block(sector, block, [0u8; 16], keys).await
    }

    fn start_antenna(&self) -> bool;

    fn stop_antenna(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_id_display() {
        assert_eq!(TagId(vec![0x04, 0xA1, 0xFF]).to_string(), "04A1FF");
    }
}
