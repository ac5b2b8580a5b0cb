// NFC processor constants

use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_INPUT_TIMEOUT_MS: u64 = 60_000;

/// Data area of a 1K card
pub const DEFAULT_LAST_DATA_SECTOR: u8 = 15;

/// Customer PINs are 4 digits
pub const PIN_RANGE: RangeInclusive<u32> = 1000..=9999;
