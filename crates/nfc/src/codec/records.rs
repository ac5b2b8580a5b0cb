// Fixed-layout tag records
//
// All multi-byte integers are little-endian. Decoders return None for short
// buffers, wrong magic or a mismatched type tag.

use super::sector::{Block, BLOCK_SIZE};
use serde::{Deserialize, Serialize};

pub const CART_ITEM_SIZE: usize = 7;
pub const TIMESTAMP_MAX: u64 = (1 << 48) - 1;

const BALANCE_MAGIC: [u8; 2] = [0x42, 0x4C];
const CUSTOMER_MAGIC: [u8; 2] = [0x43, 0x55];
const CART_MAGIC: [u8; 2] = [0x43, 0x48];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TagDataType {
    Customer = 0x01,
    Cart = 0x02,
    Balance = 0x03,
}

impl TagDataType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(TagDataType::Customer),
            0x02 => Some(TagDataType::Cart),
            0x03 => Some(TagDataType::Balance),
            _ => None,
        }
    }
}

fn has_header(data: &[u8], magic: [u8; 2], data_type: TagDataType) -> bool {
    data.len() >= BLOCK_SIZE && data[..2] == magic && data[2] == data_type as u8
}

fn write_u48(buf: &mut [u8], value: u64) {
    buf[..6].copy_from_slice(&(value & TIMESTAMP_MAX).to_le_bytes()[..6]);
}

fn read_u48(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&buf[..6]);
    u64::from_le_bytes(bytes)
}

/// One cart line: `[id_lo, id_hi, count, price_b0..b3]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: u16,
    pub count: u8,
    /// Unit price in cents
    pub price: u32,
}

impl CartItem {
    pub fn new(product_id: u16, count: u8, price: u32) -> Self {
        Self {
            product_id,
            count,
            price,
        }
    }

    pub fn encode(&self) -> [u8; CART_ITEM_SIZE] {
        let mut buf = [0u8; CART_ITEM_SIZE];
        buf[..2].copy_from_slice(&self.product_id.to_le_bytes());
        buf[2] = self.count;
        buf[3..].copy_from_slice(&self.price.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        let data = data.get(..CART_ITEM_SIZE)?;
        Some(Self {
            product_id: u16::from_le_bytes([data[0], data[1]]),
            count: data[2],
            price: u32::from_le_bytes([data[3], data[4], data[5], data[6]]),
        })
    }

    pub fn subtotal(&self) -> u64 {
        u64::from(self.count) * u64::from(self.price)
    }
}

/// Sector 0 block 2: current balance in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceHeader {
    pub balance: u32,
    /// Milliseconds since epoch, truncated to 48 bits
    pub timestamp: u64,
}

impl BalanceHeader {
    pub fn new(balance: u32, timestamp: u64) -> Self {
        Self { balance, timestamp }
    }

    pub fn encode(&self) -> Block {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..2].copy_from_slice(&BALANCE_MAGIC);
        buf[2] = TagDataType::Balance as u8;
        buf[3..7].copy_from_slice(&self.balance.to_le_bytes());
        write_u48(&mut buf[7..13], self.timestamp);
        buf
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if !has_header(data, BALANCE_MAGIC, TagDataType::Balance) {
            return None;
        }
        Some(Self {
            balance: u32::from_le_bytes([data[3], data[4], data[5], data[6]]),
            timestamp: read_u48(&data[7..13]),
        })
    }
}

/// Sector 0 block 1: where the customer JSON ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerHeader {
    pub end_sector: u8,
    pub end_block: u8,
    pub total_bytes: u16,
    pub timestamp: u64,
}

impl CustomerHeader {
    pub fn encode(&self) -> Block {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..2].copy_from_slice(&CUSTOMER_MAGIC);
        buf[2] = TagDataType::Customer as u8;
        buf[3] = self.end_sector;
        buf[4] = self.end_block;
        buf[5..7].copy_from_slice(&self.total_bytes.to_le_bytes());
        write_u48(&mut buf[7..13], self.timestamp);
        buf
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if !has_header(data, CUSTOMER_MAGIC, TagDataType::Customer) {
            return None;
        }
        Some(Self {
            end_sector: data[3],
            end_block: data[4],
            total_bytes: u16::from_le_bytes([data[5], data[6]]),
            timestamp: read_u48(&data[7..13]),
        })
    }
}

/// Bounds of the packed cart items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartHeader {
    pub start_sector: u8,
    pub start_block: u8,
    pub end_sector: u8,
    pub end_block: u8,
    pub item_count: u8,
    pub total_bytes: u16,
    pub timestamp: u64,
}

impl CartHeader {
    pub fn encode(&self) -> Block {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..2].copy_from_slice(&CART_MAGIC);
        buf[2] = TagDataType::Cart as u8;
        buf[3] = self.start_sector;
        buf[4] = self.start_block;
        buf[5] = self.end_sector;
        buf[6] = self.end_block;
        buf[7] = self.item_count;
        buf[8..10].copy_from_slice(&self.total_bytes.to_le_bytes());
        write_u48(&mut buf[10..16], self.timestamp);
        buf
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if !has_header(data, CART_MAGIC, TagDataType::Cart) {
            return None;
        }
        Some(Self {
            start_sector: data[3],
            start_block: data[4],
            end_sector: data[5],
            end_block: data[6],
            item_count: data[7],
            total_bytes: u16::from_le_bytes([data[8], data[9]]),
            timestamp: read_u48(&data[10..16]),
        })
    }
}
