// Domain Failure Kinds
//
// Every processor maps its internal faults onto this closed set before a
// result reaches the queue, so recovery prompts are uniform across families.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorEvent {
    #[error("Unexpected processing failure")]
    Generic,

    #[error("Operation timed out")]
    Timeout,

    #[error("Hardware fault")]
    HardwareFault,

    #[error("Insufficient space on tag")]
    InsufficientSpace,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Operation cancelled by user")]
    CancelledByUser,

    #[error("Operation aborted")]
    OperationAborted,

    #[error("No processor registered for item")]
    ProcessorNotFound,

    // NFC family
    #[error("Tag not found")]
    NfcTagNotFound,

    #[error("Timed out waiting for tag")]
    NfcTagReachTimeout,

    #[error("Invalid sector keys")]
    NfcInvalidKeys,

    #[error("Sector keys not provided")]
    NfcMissingKeys,

    #[error("Tag read failed")]
    NfcReadError,

    #[error("Tag write failed")]
    NfcWriteError,

    #[error("No sector could be authenticated")]
    NfcNotAuthenticated,

    #[error("Balance amount out of range")]
    NfcBalanceInvalidAmount,

    #[error("Balance read failed")]
    NfcBalanceReadError,

    #[error("Balance write failed")]
    NfcBalanceWriteError,

    #[error("Cart read failed")]
    NfcCartReadError,

    #[error("Cart write failed")]
    NfcCartWriteError,

    #[error("Customer data missing or corrupt")]
    NfcCustomerDataError,

    #[error("Incorrect PIN")]
    NfcPinIncorrect,

    #[error("Product quantity overflow")]
    ProductQuantityOverflow,
}

impl ErrorEvent {
    /// Transport faults (card removed, RF timeout) as opposed to domain validation
    pub fn is_transport_fault(self) -> bool {
        matches!(
            self,
            ErrorEvent::Timeout
                | ErrorEvent::HardwareFault
                | ErrorEvent::NfcTagNotFound
                | ErrorEvent::NfcTagReachTimeout
                | ErrorEvent::NfcReadError
                | ErrorEvent::NfcWriteError
        )
    }
}
