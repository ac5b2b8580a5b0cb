// Tag data storage
//
// Multi-block records on the card. Layout:
// - sector 0 block 1: customer header
// - sector 0 block 2: balance header
// - sector 1 block 0 onward: customer JSON, then cart header, then cart items

pub mod balance;
pub mod cart;
pub mod customer;
pub mod formatter;

use crate::codec::{Block, BlockCursor, BLOCK_SIZE};
use crate::error::{NfcError, Result};
use crate::keys::SectorKeys;
use crate::transport::TagTransport;

pub const CUSTOMER_HEADER_LOCATION: BlockCursor = BlockCursor { sector: 0, block: 1 };
pub const BALANCE_HEADER_LOCATION: BlockCursor = BlockCursor { sector: 0, block: 2 };
pub const CUSTOMER_DATA_START: BlockCursor = BlockCursor { sector: 1, block: 0 };

/// Transport plus the keys used for every sector of one operation
#[derive(Clone, Copy)]
pub struct TagAccess<'a> {
    transport: &'a dyn TagTransport,
    keys: SectorKeys,
}

impl<'a> TagAccess<'a> {
    pub fn new(transport: &'a dyn TagTransport, keys: SectorKeys) -> Self {
        Self { transport, keys }
    }

    pub async fn read(&self, at: BlockCursor) -> Result<Block> {
        self.transport
            .read_block(at.sector, at.block, self.keys)
            .await
            .ok_or(NfcError::ReadFailed {
                sector: at.sector,
                block: at.block,
            })
    }

    pub async fn write(&self, at: BlockCursor, data: Block) -> Result<()> {
        if self.transport.write_block(at.sector, at.block, data, self.keys).await {
            Ok(())
        } else {
            Err(NfcError::WriteFailed {
                sector: at.sector,
                block: at.block,
            })
        }
    }

    /// Read `len` bytes packed from `start`
    pub async fn read_span(&self, start: BlockCursor, len: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(blocks_for(len) * BLOCK_SIZE);
        let mut cursor = start;
        while bytes.len() < len {
            bytes.extend_from_slice(&self.read(cursor).await?);
            cursor = cursor.next();
        }
        bytes.truncate(len);
        Ok(bytes)
    }

    /// Write `bytes` from `start`, zero-padding the last block.
    ///
    /// Returns the last block written, `None` for an empty span. Fails with
    /// `InsufficientSpace` before touching the tag when the data would pass
    /// `last_sector`.
    pub async fn write_span(
        &self,
        start: BlockCursor,
        bytes: &[u8],
        last_sector: u8,
    ) -> Result<Option<BlockCursor>> {
        let needed = blocks_for(bytes.len());
        let available = start.data_blocks_until(last_sector);
        if needed > available {
            return Err(NfcError::InsufficientSpace { needed, available });
        }

        let mut cursor = start;
        let mut last = None;
        for chunk in bytes.chunks(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            self.write(cursor, block).await?;
            last = Some(cursor);
            cursor = cursor.next();
        }
        Ok(last)
    }
}

pub fn blocks_for(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE)
}
