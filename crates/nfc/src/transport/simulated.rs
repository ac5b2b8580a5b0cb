// In-memory MIFARE Classic card
//
// Enforces per-sector keys and the production access bits. Key A reads back
// as zeros from a trailer, as on real cards.

use super::{TagId, TagTransport};
use crate::codec::sector::{absolute_block, sector_range};
use crate::codec::{Block, SectorTrailer, BLOCK_SIZE};
use crate::keys::{KeyType, SectorKey, SectorKeys};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const CLASSIC_1K_SECTORS: u8 = 16;
pub const CLASSIC_4K_SECTORS: u8 = 40;
const DETECT_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct SimulatedTag {
    uid: [u8; 4],
    sector_count: u8,
    memory: Mutex<Vec<Block>>,
    present: AtomicBool,
    antenna_on: AtomicBool,
    detection_aborted: AtomicBool,
    fail_writes: AtomicBool,
    auth_attempts: AtomicUsize,
}

impl SimulatedTag {
    /// 1K card (16 sectors) in transport configuration
    pub fn classic_1k(uid: [u8; 4]) -> Self {
        Self::with_sectors(uid, CLASSIC_1K_SECTORS)
    }

    /// 4K card (32 small + 8 large sectors) in transport configuration
    pub fn classic_4k(uid: [u8; 4]) -> Self {
        Self::with_sectors(uid, CLASSIC_4K_SECTORS)
    }

    fn with_sectors(uid: [u8; 4], sector_count: u8) -> Self {
        let total_blocks = usize::from(sector_range(sector_count - 1).trailer()) + 1;
        let mut memory = vec![[0u8; BLOCK_SIZE]; total_blocks];

        let bcc = uid.iter().fold(0u8, |acc, b| acc ^ b);
        memory[0][..4].copy_from_slice(&uid);
        memory[0][4] = bcc;
        memory[0][5] = 0x08;
        memory[0][6..8].copy_from_slice(&[0x04, 0x00]);

        for sector in 0..sector_count {
            memory[usize::from(sector_range(sector).trailer())] = SectorTrailer::transport().encode();
        }

        Self {
            uid,
            sector_count,
            memory: Mutex::new(memory),
            present: AtomicBool::new(true),
            antenna_on: AtomicBool::new(false),
            detection_aborted: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            auth_attempts: AtomicUsize::new(0),
        }
    }

    /// Install a trailer directly, bypassing authentication
    pub fn with_trailer(self, sector: u8, trailer: SectorTrailer) -> Self {
        if sector < self.sector_count {
            let index = usize::from(sector_range(sector).trailer());
            self.memory()[index] = trailer.encode();
        }
        self
    }

    /// Provision every sector with production keys
    pub fn with_production_keys(self, key_a: SectorKey, key_b: SectorKey) -> Self {
        (0..self.sector_count).fold(self, |tag, sector| {
            tag.with_trailer(sector, SectorTrailer::production(key_a, key_b))
        })
    }

    pub fn sector_count(&self) -> u8 {
        self.sector_count
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Make every following write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn auth_attempts(&self) -> usize {
        self.auth_attempts.load(Ordering::SeqCst)
    }

    pub fn is_antenna_on(&self) -> bool {
        self.antenna_on.load(Ordering::SeqCst)
    }

    /// Raw block contents, trailer keys included
    pub fn raw_block(&self, sector: u8, block: u8) -> Option<Block> {
        let index = absolute_block(sector, block)?;
        self.memory().get(usize::from(index)).copied()
    }

    /// Raw trailer, key A included
    pub fn trailer(&self, sector: u8) -> Option<SectorTrailer> {
        let block = sector_range(sector).trailer_offset();
        self.raw_block(sector, block)
            .and_then(|data| SectorTrailer::decode(&data))
    }

    fn memory(&self) -> MutexGuard<'_, Vec<Block>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn accepts(&self, sector: u8, key_type: KeyType, key: SectorKey) -> bool {
        match self.trailer(sector) {
            Some(trailer) => match key_type {
                KeyType::A => trailer.key_a == key,
                KeyType::B => trailer.key_b == key,
            },
            None => false,
        }
    }

    fn can_read(&self, sector: u8, keys: SectorKeys) -> bool {
        KeyType::BOTH
            .iter()
            .any(|&kt| keys.get(kt).is_some_and(|key| self.accepts(sector, kt, key)))
    }

    /// Production sectors only accept writes under key B
    fn can_write(&self, sector: u8, keys: SectorKeys) -> bool {
        let production = self.trailer(sector).is_some_and(|t| t.is_production());
        let key_b = keys
            .key_b
            .is_some_and(|key| self.accepts(sector, KeyType::B, key));
        if production {
            key_b
        } else {
            key_b || keys.key_a.is_some_and(|key| self.accepts(sector, KeyType::A, key))
        }
    }
}

#[async_trait]
impl TagTransport for SimulatedTag {
    async fn detect_tag(&self, timeout: Duration) -> Option<TagId> {
        self.detection_aborted.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_present() {
                return Some(TagId(self.uid.to_vec()));
            }
            if self.detection_aborted.load(Ordering::SeqCst) || Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(DETECT_POLL_INTERVAL).await;
        }
    }

    fn abort_detection(&self) {
        self.detection_aborted.store(true, Ordering::SeqCst);
    }

    async fn authenticate(&self, sector: u8, key_type: KeyType, key: SectorKey) -> bool {
        self.auth_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.is_present() || sector >= self.sector_count {
            return false;
        }
        self.accepts(sector, key_type, key)
    }

    async fn read_block(&self, sector: u8, block: u8, keys: SectorKeys) -> Option<Block> {
        if !self.is_present() || sector >= self.sector_count || !self.can_read(sector, keys) {
            return None;
        }
        let range = sector_range(sector);
        let mut data = self.raw_block(sector, block)?;
        if block == range.trailer_offset() {
            data[..6].fill(0);
        }
        Some(data)
    }

    async fn write_block(&self, sector: u8, block: u8, data: Block, keys: SectorKeys) -> bool {
        if !self.is_present() || sector >= self.sector_count {
            return false;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            debug!(sector, block, "Simulated write fault");
            return false;
        }
        if sector == 0 && block == 0 {
            debug!("Manufacturer block is read-only");
            return false;
        }
        let Some(index) = absolute_block(sector, block) else {
            return false;
        };
        if !self.can_write(sector, keys) {
            return false;
        }
        self.memory()[usize::from(index)] = data;
        true
    }

    fn start_antenna(&self) -> bool {
        self.antenna_on.store(true, Ordering::SeqCst);
        true
    }

    fn stop_antenna(&self) -> bool {
        self.antenna_on.store(false, Ordering::SeqCst);
        true
    }
}
