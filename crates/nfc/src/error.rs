// NFC Error Types
//
// Internal faults of tag operations. Each maps onto exactly one ErrorEvent
// before leaving the processor.

use ticpass_core::domain::ErrorEvent;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NfcError {
    #[error("Tag not found")]
    TagNotFound,

    #[error("No tag presented within {0}ms")]
    ReachTimeout(u64),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Sector keys were not provided")]
    MissingKeys,

    #[error("No sector could be authenticated")]
    NotAuthenticated,

    #[error("Read failed at sector {sector} block {block}")]
    ReadFailed { sector: u8, block: u8 },

    #[error("Write failed at sector {sector} block {block}")]
    WriteFailed { sector: u8, block: u8 },

    #[error("Balance amount out of range: {0}")]
    BalanceOutOfRange(u64),

    #[error("Balance read failed: {0}")]
    BalanceRead(String),

    #[error("Balance write failed: {0}")]
    BalanceWrite(String),

    #[error("Cart read failed: {0}")]
    CartRead(String),

    #[error("Cart write failed: {0}")]
    CartWrite(String),

    #[error("Customer data error: {0}")]
    CustomerData(String),

    #[error("Insufficient space: need {needed} blocks, {available} available")]
    InsufficientSpace { needed: usize, available: usize },

    #[error("Quantity overflow for product {0}")]
    QuantityOverflow(u16),

    #[error("Incorrect PIN")]
    PinIncorrect,

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Operation aborted")]
    Aborted,
}

impl NfcError {
    /// Closed failure kind reported to the queue
    pub fn event(&self) -> ErrorEvent {
        match self {
            NfcError::TagNotFound => ErrorEvent::NfcTagNotFound,
            NfcError::ReachTimeout(_) => ErrorEvent::NfcTagReachTimeout,
            NfcError::InvalidKey(_) => ErrorEvent::NfcInvalidKeys,
            NfcError::MissingKeys => ErrorEvent::NfcMissingKeys,
            NfcError::NotAuthenticated => ErrorEvent::NfcNotAuthenticated,
            NfcError::ReadFailed { .. } => ErrorEvent::NfcReadError,
            NfcError::WriteFailed { .. } => ErrorEvent::NfcWriteError,
            NfcError::BalanceOutOfRange(_) => ErrorEvent::NfcBalanceInvalidAmount,
            NfcError::BalanceRead(_) => ErrorEvent::NfcBalanceReadError,
            NfcError::BalanceWrite(_) => ErrorEvent::NfcBalanceWriteError,
            NfcError::CartRead(_) => ErrorEvent::NfcCartReadError,
            NfcError::CartWrite(_) => ErrorEvent::NfcCartWriteError,
            NfcError::CustomerData(_) => ErrorEvent::NfcCustomerDataError,
            NfcError::InsufficientSpace { .. } => ErrorEvent::InsufficientSpace,
            NfcError::QuantityOverflow(_) => ErrorEvent::ProductQuantityOverflow,
            NfcError::PinIncorrect => ErrorEvent::NfcPinIncorrect,
            NfcError::Cancelled => ErrorEvent::CancelledByUser,
            NfcError::Aborted => ErrorEvent::OperationAborted,
        }
    }
}

impl From<NfcError> for ErrorEvent {
    fn from(e: NfcError) -> Self {
        e.event()
    }
}

pub type Result<T> = std::result::Result<T, NfcError>;
