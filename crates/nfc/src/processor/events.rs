// NFC processor events and input contracts

use crate::codec::{BalanceHeader, CartItem};
use crate::keys::KeyType;
use crate::storage::customer::CustomerRecord;
use serde::{Deserialize, Serialize};

/// Progress of the running operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfcEvent {
    Start { operation: String },
    ReachTag { timeout_ms: u64 },
    TagDetected { uid: String },
    AuthenticatingSectors,
    KeyFound {
        sector: u8,
        key_type: KeyType,
        complete_sectors: usize,
        total_sectors: usize,
    },
    ValidatingSectorKeys,
    FormattingTag,
    ReadingCustomerData,
    WritingCustomerData,
    ReadingCart,
    WritingCart,
    ReadingBalance,
    WritingBalance,
    Cancelled,
}

/// What the processor needs from the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfcInputKind {
    /// Owned key pair (hex) for the tag
    ConfirmKeys,
    /// Name, national id and phone of the new customer
    ConfirmCustomerData,
    /// Show the generated PIN; any answer continues
    SaveCustomerPin { pin: String },
    EnterPin { customer_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub national_id: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NfcInputValue {
    Keys { key_a: String, key_b: String },
    CustomerData(CustomerDetails),
    Pin(String),
    Confirmed(bool),
}

/// Success payload of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfcOutput {
    Formatted {
        formatted_sectors: Vec<u8>,
        failed_sectors: Vec<u8>,
    },
    CustomerSetup { customer: CustomerRecord },
    CustomerAuth { customer: CustomerRecord },
    Cart { items: Vec<CartItem> },
    Balance { balance: u32, timestamp: u64 },
}

impl NfcOutput {
    pub fn balance(header: Option<BalanceHeader>) -> Self {
        let header = header.unwrap_or(BalanceHeader::new(0, 0));
        NfcOutput::Balance {
            balance: header.balance,
            timestamp: header.timestamp,
        }
    }
}
