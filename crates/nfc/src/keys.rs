// Sector Keys
//
// 6-byte MIFARE Classic keys, their hex form and the per-sector key map
// produced by recovery.

use crate::error::{NfcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const KEY_SIZE: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectorKey([u8; KEY_SIZE]);

impl SectorKey {
    /// Factory default (transport configuration)
    pub const DEFAULT: SectorKey = SectorKey([0xFF; KEY_SIZE]);

    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Parse 12 hex digits (case-insensitive, surrounding whitespace ignored)
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != KEY_SIZE * 2 || !s.is_ascii() {
            return Err(NfcError::InvalidKey(format!(
                "expected {} hex digits, got {:?}",
                KEY_SIZE * 2,
                s
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(NfcError::InvalidKey(format!("invalid hex digits in {:?}", s)));
        }

        let mut bytes = [0u8; KEY_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &s[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| NfcError::InvalidKey(format!("invalid hex digits {:?}", pair)))?;
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl fmt::Display for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectorKey({})", self.to_hex())
    }
}

impl FromStr for SectorKey {
    type Err = NfcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for SectorKey {
    type Error = NfcError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<SectorKey> for String {
    fn from(key: SectorKey) -> Self {
        key.to_hex()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    A,
    B,
}

impl KeyType {
    pub const BOTH: [KeyType; 2] = [KeyType::A, KeyType::B];
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::A => f.write_str("A"),
            KeyType::B => f.write_str("B"),
        }
    }
}

/// Known keys of one sector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorKeys {
    pub key_a: Option<SectorKey>,
    pub key_b: Option<SectorKey>,
}

impl SectorKeys {
    pub fn both(key_a: SectorKey, key_b: SectorKey) -> Self {
        Self {
            key_a: Some(key_a),
            key_b: Some(key_b),
        }
    }

    pub fn get(&self, key_type: KeyType) -> Option<SectorKey> {
        match key_type {
            KeyType::A => self.key_a,
            KeyType::B => self.key_b,
        }
    }

    pub fn set(&mut self, key_type: KeyType, key: SectorKey) {
        match key_type {
            KeyType::A => self.key_a = Some(key),
            KeyType::B => self.key_b = Some(key),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.key_a.is_some() && self.key_b.is_some()
    }

    pub fn is_partial(&self) -> bool {
        self.key_a.is_some() != self.key_b.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.key_a.is_none() && self.key_b.is_none()
    }
}

/// Sector number -> known keys
pub type TagKeyMap = BTreeMap<u8, SectorKeys>;

/// Parse an operator-supplied A/B pair
pub fn parse_key_pair(key_a: &str, key_b: &str) -> Result<SectorKeys> {
    Ok(SectorKeys::both(
        SectorKey::from_hex(key_a)?,
        SectorKey::from_hex(key_b)?,
    ))
}
