// Tag Binary Codec
//
// Pure encode/decode of fixed-layout records and MIFARE Classic sector
// addressing. No I/O.

pub mod records;
pub mod sector;
pub mod trailer;

pub use records::{BalanceHeader, CartHeader, CartItem, CustomerHeader, TagDataType};
pub use sector::{sector_range, Block, BlockCursor, SectorRange, BLOCK_SIZE};
pub use trailer::SectorTrailer;
