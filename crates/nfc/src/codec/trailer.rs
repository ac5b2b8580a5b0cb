// Sector trailer: [keyA(6), accessBits(3), gpb(1), keyB(6)]

use super::sector::{Block, BLOCK_SIZE};
use crate::keys::{SectorKey, KEY_SIZE};

pub const TRANSPORT_ACCESS_BITS: [u8; 3] = [0xFF, 0x07, 0x80];
pub const TRANSPORT_GPB: u8 = 0x69;

/// Data blocks: read A|B, write B. Trailer: key A never writes.
pub const PRODUCTION_ACCESS_BITS: [u8; 3] = [0x78, 0x77, 0x88];
pub const PRODUCTION_GPB: u8 = 0x6B;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorTrailer {
    pub key_a: SectorKey,
    pub access_bits: [u8; 3],
    pub gpb: u8,
    pub key_b: SectorKey,
}

impl SectorTrailer {
    /// Factory configuration: default keys, everything open
    pub fn transport() -> Self {
        Self {
            key_a: SectorKey::DEFAULT,
            access_bits: TRANSPORT_ACCESS_BITS,
            gpb: TRANSPORT_GPB,
            key_b: SectorKey::DEFAULT,
        }
    }

    pub fn production(key_a: SectorKey, key_b: SectorKey) -> Self {
        Self {
            key_a,
            access_bits: PRODUCTION_ACCESS_BITS,
            gpb: PRODUCTION_GPB,
            key_b,
        }
    }

    pub fn is_production(&self) -> bool {
        self.access_bits == PRODUCTION_ACCESS_BITS
    }

    pub fn encode(&self) -> Block {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..6].copy_from_slice(self.key_a.as_bytes());
        buf[6..9].copy_from_slice(&self.access_bits);
        buf[9] = self.gpb;
        buf[10..].copy_from_slice(self.key_b.as_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < BLOCK_SIZE {
            return None;
        }
        let mut key_a = [0u8; KEY_SIZE];
        let mut key_b = [0u8; KEY_SIZE];
        key_a.copy_from_slice(&data[..6]);
        key_b.copy_from_slice(&data[10..16]);
        Some(Self {
            key_a: SectorKey::new(key_a),
            access_bits: [data[6], data[7], data[8]],
            gpb: data[9],
            key_b: SectorKey::new(key_b),
        })
    }
}
