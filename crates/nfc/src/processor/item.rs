// NFC queue item

use crate::brute_force::BruteForceMode;
use crate::storage::balance::BalanceOperation;
use crate::storage::cart::CartOperation;
use serde::{Deserialize, Serialize};
use ticpass_core::domain::{Priority, QueueItem, QueueItemStatus};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfcOperation {
    TagFormat {
        brute_force: BruteForceMode,
    },
    CustomerSetup,
    CustomerAuth,
    CartRead,
    CartUpdate {
        product_id: u16,
        quantity: u8,
        /// Unit price in cents
        price: u32,
        op: CartOperation,
    },
    BalanceRead,
    BalanceUpdate {
        /// Cents; must fit in 32 bits
        amount: u64,
        op: BalanceOperation,
    },
}

impl NfcOperation {
    pub fn name(&self) -> &'static str {
        match self {
            NfcOperation::TagFormat { .. } => "TAG_FORMAT",
            NfcOperation::CustomerSetup => "CUSTOMER_SETUP",
            NfcOperation::CustomerAuth => "CUSTOMER_AUTH",
            NfcOperation::CartRead => "CART_READ",
            NfcOperation::CartUpdate { .. } => "CART_UPDATE",
            NfcOperation::BalanceRead => "BALANCE_READ",
            NfcOperation::BalanceUpdate { .. } => "BALANCE_UPDATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcQueueItem {
    pub id: String,
    pub priority: Priority,
    pub status: QueueItemStatus,
    pub operation: NfcOperation,
}

impl NfcQueueItem {
    pub fn new(operation: NfcOperation) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            priority: 0,
            status: QueueItemStatus::Pending,
            operation,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl QueueItem for NfcQueueItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn status(&self) -> QueueItemStatus {
        self.status
    }

    fn set_status(&mut self, status: QueueItemStatus) {
        self.status = status;
    }
}
