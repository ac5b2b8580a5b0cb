// Balance storage (sector 0 block 2)

use super::{TagAccess, BALANCE_HEADER_LOCATION};
use crate::codec::BalanceHeader;
use crate::error::{NfcError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MAX_BALANCE: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceOperation {
    Set,
    Clear,
}

/// Current header; `None` when the block holds no balance record
pub async fn read_balance(access: &TagAccess<'_>) -> Result<Option<BalanceHeader>> {
    let block = access
        .read(BALANCE_HEADER_LOCATION)
        .await
        .map_err(|e| NfcError::BalanceRead(e.to_string()))?;
    Ok(BalanceHeader::decode(&block))
}

pub async fn write_balance(
    access: &TagAccess<'_>,
    amount: u64,
    timestamp: u64,
) -> Result<BalanceHeader> {
    let balance = u32::try_from(amount).map_err(|_| NfcError::BalanceOutOfRange(amount))?;
    let header = BalanceHeader::new(balance, timestamp);
    access
        .write(BALANCE_HEADER_LOCATION, header.encode())
        .await
        .map_err(|e| NfcError::BalanceWrite(e.to_string()))?;
    debug!(balance, "Balance written");
    Ok(header)
}
