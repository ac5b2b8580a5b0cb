// Balance read and update

use super::{NfcEvent, NfcOutput, NfcProcessor};
use crate::error::{NfcError, Result};
use crate::storage::balance::{read_balance, write_balance, BalanceOperation, MAX_BALANCE};
use crate::storage::TagAccess;
use tracing::info;

impl NfcProcessor {
    pub(super) async fn read_balance(&self) -> Result<NfcOutput> {
        self.detect().await?;
        let keys = self.request_keys().await?;

        self.channels.emit(NfcEvent::ReadingBalance);
        let access = TagAccess::new(self.transport.as_ref(), keys);
        let header = read_balance(&access).await?;
        Ok(NfcOutput::balance(header))
    }

    pub(super) async fn update_balance(
        &self,
        amount: u64,
        operation: BalanceOperation,
    ) -> Result<NfcOutput> {
        let amount = match operation {
            BalanceOperation::Set => amount,
            BalanceOperation::Clear => 0,
        };
        if amount > MAX_BALANCE {
            return Err(NfcError::BalanceOutOfRange(amount));
        }

        self.detect().await?;
        let keys = self.request_keys().await?;
        self.check_aborted()?;

        self.channels.emit(NfcEvent::WritingBalance);
        let access = TagAccess::new(self.transport.as_ref(), keys);
        let header = write_balance(&access, amount, self.timestamp()).await?;
        info!(balance = header.balance, ?operation, "Balance written");
        Ok(NfcOutput::balance(Some(header)))
    }
}
