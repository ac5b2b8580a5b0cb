// Ticpass NFC - MIFARE Classic codec, key recovery & queue processors
// All hardware access goes through the TagTransport port

pub mod brute_force;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod processor;
pub mod storage;
pub mod transport;

pub use brute_force::{BruteForceConfig, BruteForceMode, BruteForceResult, SectorKeyRecovery};
pub use config::NfcConfig;
pub use error::{NfcError, Result};
pub use keys::{KeyType, SectorKey, SectorKeys, TagKeyMap};
pub use processor::{NfcOperation, NfcProcessor, NfcQueueItem};
pub use transport::{TagId, TagTransport};
