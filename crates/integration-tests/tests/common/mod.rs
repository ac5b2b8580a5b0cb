//! Shared wiring for the cross-crate scenarios:
//! HybridQueueManager + NfcProcessor (simulated card) + SQLite storage.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ticpass_core::application::HybridQueueManager;
use ticpass_core::domain::{
    ManagerConfig, QueueInputKind, QueueInputRequest, QueueInputResponse, QueueItemStatus,
    UserInputResponse,
};
use ticpass_core::port::time_provider::SystemTimeProvider;
use ticpass_core::port::QueueStorage;
use ticpass_infra_sqlite::{create_pool, run_migrations, SqlitePool, SqliteQueueStorage};
use ticpass_nfc::brute_force::BruteForceConfig;
use ticpass_nfc::keys::parse_key_pair;
use ticpass_nfc::processor::{CustomerDetails, NfcInputKind, NfcInputValue};
use ticpass_nfc::transport::SimulatedTag;
use ticpass_nfc::{NfcConfig, NfcProcessor, NfcQueueItem, SectorKey, SectorKeys};
use tokio::time::timeout;

pub type Manager = HybridQueueManager<NfcProcessor>;
pub type Storage = SqliteQueueStorage<NfcQueueItem>;

pub const UID: [u8; 4] = [0x04, 0x5C, 0x18, 0xE2];
pub const KEY_A: &str = "A1B2C3D4E5F6";
pub const KEY_B: &str = "B1C2D3E4F5A6";
pub const QUEUE: &str = "nfc";
pub const WAIT: Duration = Duration::from_secs(10);

pub const ALL_STATUSES: [QueueItemStatus; 5] = [
    QueueItemStatus::Pending,
    QueueItemStatus::Processing,
    QueueItemStatus::Completed,
    QueueItemStatus::Failed,
    QueueItemStatus::Cancelled,
];

pub fn keys() -> SectorKeys {
    parse_key_pair(KEY_A, KEY_B).unwrap()
}

/// Card straight from the factory (transport keys)
pub fn blank_tag() -> Arc<SimulatedTag> {
    Arc::new(SimulatedTag::classic_1k(UID))
}

/// Card already formatted with the operator's keys
pub fn formatted_tag() -> Arc<SimulatedTag> {
    Arc::new(SimulatedTag::classic_1k(UID).with_production_keys(
        SectorKey::from_hex(KEY_A).unwrap(),
        SectorKey::from_hex(KEY_B).unwrap(),
    ))
}

pub fn nfc_config() -> NfcConfig {
    NfcConfig {
        detect_timeout: Duration::from_millis(100),
        input_timeout_ms: Some(1_000),
        brute_force: BruteForceConfig {
            attempt_timeout: Duration::from_millis(50),
            ..BruteForceConfig::default()
        },
        ..NfcConfig::default()
    }
}

pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub fn storage(pool: &SqlitePool) -> Arc<Storage> {
    Arc::new(SqliteQueueStorage::new(
        pool.clone(),
        QUEUE,
        Arc::new(SystemTimeProvider),
    ))
}

pub fn manager(storage: Arc<Storage>, tag: Arc<SimulatedTag>, config: ManagerConfig) -> Manager {
    let processor = Arc::new(NfcProcessor::new(tag, nfc_config()));
    HybridQueueManager::new(storage, processor, config)
}

pub async fn finish(manager: &Manager) {
    timeout(WAIT, manager.join())
        .await
        .expect("processing loop did not finish");
}

pub async fn stored_with(storage: &Storage, status: QueueItemStatus) -> Vec<NfcQueueItem> {
    storage.get_all_by_status(&[status]).await.unwrap()
}

/// Cashier at the terminal.
///
/// Processor prompts get the operator keys and demo customer data; the PIN
/// shown at setup is typed back at auth. Queue prompts go to `decide`.
pub struct Operator {
    queue_prompts: Mutex<Vec<QueueInputKind>>,
    pin: Mutex<Option<String>>,
}

impl Operator {
    pub fn queue_prompts(&self) -> Vec<QueueInputKind> {
        self.queue_prompts.lock().unwrap().clone()
    }

    /// Errors seen in retry/skip prompts, in order
    pub fn reported_errors(&self) -> Vec<ticpass_core::domain::ErrorEvent> {
        self.queue_prompts()
            .into_iter()
            .filter_map(|kind| match kind {
                QueueInputKind::ErrorRetryOrSkip { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }

    fn answer(&self, kind: &NfcInputKind) -> NfcInputValue {
        match kind {
            NfcInputKind::ConfirmKeys => NfcInputValue::Keys {
                key_a: KEY_A.to_string(),
                key_b: KEY_B.to_string(),
            },
            NfcInputKind::ConfirmCustomerData => NfcInputValue::CustomerData(CustomerDetails {
                name: "Grace Hopper".to_string(),
                national_id: "19061209".to_string(),
                phone: "+1 212 555 0100".to_string(),
            }),
            NfcInputKind::SaveCustomerPin { pin } => {
                *self.pin.lock().unwrap() = Some(pin.clone());
                NfcInputValue::Confirmed(true)
            }
            NfcInputKind::EnterPin { .. } => {
                NfcInputValue::Pin(self.pin.lock().unwrap().clone().unwrap_or_default())
            }
        }
    }
}

/// Proceed on confirmations, abort failed items
pub fn proceed_or_abort(request: &QueueInputRequest) -> QueueInputResponse {
    match request.kind {
        QueueInputKind::ConfirmNextProcessor { .. } => QueueInputResponse::proceed(&request.id),
        QueueInputKind::ErrorRetryOrSkip { .. } => QueueInputResponse::on_error_abort(&request.id),
    }
}

/// Subscribe and start answering; call before `start_processing`
pub fn spawn_operator(
    manager: &Manager,
    decide: impl Fn(&QueueInputRequest) -> QueueInputResponse + Send + Sync + 'static,
) -> Arc<Operator> {
    let operator = Arc::new(Operator {
        queue_prompts: Mutex::new(Vec::new()),
        pin: Mutex::new(None),
    });

    let mut queue_requests = manager.subscribe_queue_input_requests();
    let queue_manager = manager.clone();
    let queue_operator = Arc::clone(&operator);
    tokio::spawn(async move {
        while let Ok(request) = queue_requests.recv().await {
            queue_operator
                .queue_prompts
                .lock()
                .unwrap()
                .push(request.kind.clone());
            queue_manager.provide_queue_input(decide(&request));
        }
    });

    let mut processor_requests = manager.subscribe_processor_input_requests();
    let processor_manager = manager.clone();
    let processor_operator = Arc::clone(&operator);
    tokio::spawn(async move {
        while let Ok(request) = processor_requests.recv().await {
            let value = processor_operator.answer(&request.kind);
            processor_manager.provide_processor_input(UserInputResponse::new(request.id, value));
        }
    });

    operator
}
