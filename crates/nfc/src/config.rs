// NFC processor configuration

use crate::brute_force::BruteForceConfig;
use crate::processor::constants::{
    DEFAULT_DETECT_TIMEOUT, DEFAULT_INPUT_TIMEOUT_MS, DEFAULT_LAST_DATA_SECTOR,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcConfig {
    /// How long to wait for the customer to present the tag
    pub detect_timeout: Duration,
    /// Advisory timeout attached to processor input requests
    pub input_timeout_ms: Option<u64>,
    /// Highest sector used for customer and cart data
    pub last_data_sector: u8,
    pub brute_force: BruteForceConfig,
}

impl Default for NfcConfig {
    fn default() -> Self {
        Self {
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
            input_timeout_ms: Some(DEFAULT_INPUT_TIMEOUT_MS),
            last_data_sector: DEFAULT_LAST_DATA_SECTOR,
            brute_force: BruteForceConfig::default(),
        }
    }
}
