// Sector addressing
//
// Sectors 0..32 hold 4 blocks, sectors 32.. hold 16 (MIFARE Classic 4K).
// The last block of every sector is its trailer.

use std::ops::Range;

pub const BLOCK_SIZE: usize = 16;
pub type Block = [u8; BLOCK_SIZE];

pub const SMALL_SECTOR_COUNT: u8 = 32;
pub const SMALL_SECTOR_BLOCKS: u8 = 4;
pub const LARGE_SECTOR_BLOCKS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    pub first_block: u16,
    pub block_count: u8,
}

impl SectorRange {
    /// Absolute index of the trailer block
    pub fn trailer(&self) -> u16 {
        self.first_block + u16::from(self.block_count) - 1
    }

    /// Trailer position relative to the sector
    pub fn trailer_offset(&self) -> u8 {
        self.block_count - 1
    }

    pub fn data_block_count(&self) -> u8 {
        self.block_count - 1
    }

    /// Absolute block indices of the whole sector, trailer included
    pub fn blocks(&self) -> Range<u16> {
        self.first_block..self.first_block + u16::from(self.block_count)
    }
}

pub fn sector_range(sector: u8) -> SectorRange {
    if sector < SMALL_SECTOR_COUNT {
        SectorRange {
            first_block: u16::from(sector) * u16::from(SMALL_SECTOR_BLOCKS),
            block_count: SMALL_SECTOR_BLOCKS,
        }
    } else {
        SectorRange {
            first_block: u16::from(SMALL_SECTOR_COUNT) * u16::from(SMALL_SECTOR_BLOCKS)
                + u16::from(sector - SMALL_SECTOR_COUNT) * u16::from(LARGE_SECTOR_BLOCKS),
            block_count: LARGE_SECTOR_BLOCKS,
        }
    }
}

pub fn is_trailer(sector: u8, block: u8) -> bool {
    block == sector_range(sector).trailer_offset()
}

/// Absolute block index, `None` when `block` is outside the sector
pub fn absolute_block(sector: u8, block: u8) -> Option<u16> {
    let range = sector_range(sector);
    (block < range.block_count).then(|| range.first_block + u16::from(block))
}

/// Position of a data block; never points at a trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockCursor {
    pub sector: u8,
    pub block: u8,
}

impl BlockCursor {
    /// Cursor at `(sector, block)`, moved forward if that is a trailer
    pub fn new(sector: u8, block: u8) -> Self {
        let cursor = Self { sector, block };
        if block >= sector_range(sector).trailer_offset() {
            Self {
                sector: sector.saturating_add(1),
                block: 0,
            }
        } else {
            cursor
        }
    }

    /// Next data block, skipping the trailer
    pub fn next(self) -> Self {
        Self::new(self.sector, self.block + 1)
    }

    /// Data blocks from this cursor up to and including `last_sector`
    pub fn data_blocks_until(self, last_sector: u8) -> usize {
        if self.sector > last_sector {
            return 0;
        }
        let first = usize::from(sector_range(self.sector).data_block_count() - self.block);
        let rest: usize = (u16::from(self.sector) + 1..=u16::from(last_sector))
            .map(|s| usize::from(sector_range(s as u8).data_block_count()))
            .sum();
        first + rest
    }
}
