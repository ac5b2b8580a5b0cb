// NFC Processor - tag operations behind the QueueProcessor port
//
// Every operation follows the same shape: wait for the tag, obtain the owned
// keys from the operator, then read or write through the transport.

pub mod constants;
mod balance;
mod cart;
mod customer;
mod events;
mod format;
mod item;

pub use events::{CustomerDetails, NfcEvent, NfcInputKind, NfcInputValue, NfcOutput};
pub use item::{NfcOperation, NfcQueueItem};

use crate::brute_force::SectorKeyRecovery;
use crate::config::NfcConfig;
use crate::error::{NfcError, Result};
use crate::keys::{parse_key_pair, SectorKeys};
use crate::transport::{TagId, TagTransport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ticpass_core::application::ProcessorChannels;
use ticpass_core::domain::{ProcessingResult, UserInputRequest, UserInputResponse};
use ticpass_core::port::id_provider::UuidProvider;
use ticpass_core::port::time_provider::SystemTimeProvider;
use ticpass_core::port::{IdProvider, QueueProcessor, TimeProvider};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type NfcChannels = ProcessorChannels<NfcEvent, NfcInputKind, NfcInputValue>;

pub struct NfcProcessor {
    transport: Arc<dyn TagTransport>,
    recovery: SectorKeyRecovery,
    channels: NfcChannels,
    time: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
    config: NfcConfig,
    abort_requested: AtomicBool,
    /// Set while an operation runs; stays set if the operation future is
    /// dropped midway, so the follow-up abort still releases the antenna
    active: AtomicBool,
}

impl NfcProcessor {
    pub fn new(transport: Arc<dyn TagTransport>, config: NfcConfig) -> Self {
        Self::with_providers(
            transport,
            config,
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        )
    }

    pub fn with_providers(
        transport: Arc<dyn TagTransport>,
        config: NfcConfig,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            recovery: SectorKeyRecovery::new(Arc::clone(&transport), config.brute_force.clone()),
            channels: ProcessorChannels::new(Arc::clone(&ids)),
            transport,
            time,
            ids,
            config,
            abort_requested: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &NfcConfig {
        &self.config
    }

    fn timestamp(&self) -> u64 {
        u64::try_from(self.time.now_millis()).unwrap_or(0)
    }

    fn is_abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    async fn run(&self, operation: &NfcOperation) -> Result<NfcOutput> {
        match operation {
            NfcOperation::TagFormat { brute_force } => self.format(*brute_force).await,
            NfcOperation::CustomerSetup => self.setup_customer().await,
            NfcOperation::CustomerAuth => self.authenticate_customer().await,
            NfcOperation::CartRead => self.read_cart().await,
            NfcOperation::CartUpdate {
                product_id,
                quantity,
                price,
                op,
            } => self.update_cart(*product_id, *quantity, *price, *op).await,
            NfcOperation::BalanceRead => self.read_balance().await,
            NfcOperation::BalanceUpdate { amount, op } => self.update_balance(*amount, *op).await,
        }
    }

    /// Wait for the tag to enter the field
    async fn detect(&self) -> Result<TagId> {
        let timeout = self.config.detect_timeout;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.channels.emit(NfcEvent::ReachTag { timeout_ms });

        let uid = self
            .transport
            .detect_tag(timeout)
            .await
            .ok_or(NfcError::ReachTimeout(timeout_ms))?;

        info!(uid = %uid, "Tag detected");
        self.channels.emit(NfcEvent::TagDetected {
            uid: uid.to_string(),
        });
        Ok(uid)
    }

    async fn ask(&self, kind: NfcInputKind) -> Option<NfcInputValue> {
        self.channels
            .request_input(kind, self.config.input_timeout_ms)
            .await
            .into_value()
    }

    /// Owned key pair from the operator
    async fn request_keys(&self) -> Result<SectorKeys> {
        match self.ask(NfcInputKind::ConfirmKeys).await {
            Some(NfcInputValue::Keys { key_a, key_b }) => parse_key_pair(&key_a, &key_b),
            Some(other) => {
                warn!(value = ?other, "Unexpected answer to key request");
                Err(NfcError::MissingKeys)
            }
            None => Err(NfcError::MissingKeys),
        }
    }

    fn check_aborted(&self) -> Result<()> {
        if self.is_abort_requested() {
            Err(NfcError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueProcessor for NfcProcessor {
    type Item = NfcQueueItem;
    type Output = NfcOutput;
    type Event = NfcEvent;
    type InputKind = NfcInputKind;
    type InputValue = NfcInputValue;

    fn subscribe_events(&self) -> broadcast::Receiver<NfcEvent> {
        self.channels.subscribe_events()
    }

    fn subscribe_input_requests(&self) -> broadcast::Receiver<UserInputRequest<NfcInputKind>> {
        self.channels.subscribe_requests()
    }

    async fn process(&self, item: &NfcQueueItem) -> ProcessingResult<NfcOutput> {
        self.abort_requested.store(false, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        let operation = item.operation.name();
        info!(item_id = %item.id, operation, "NFC operation started");
        self.channels.emit(NfcEvent::Start {
            operation: operation.to_string(),
        });

        if !self.transport.start_antenna() {
            warn!(item_id = %item.id, "Antenna failed to start");
        }
        let result = self.run(&item.operation).await;
        self.transport.stop_antenna();
        self.active.store(false, Ordering::SeqCst);

        let result = match result {
            Err(e) if self.is_abort_requested() => {
                debug!(item_id = %item.id, error = %e, "Failure superseded by abort");
                Err(NfcError::Aborted)
            }
            other => other,
        };

        match &result {
            Ok(_) => info!(item_id = %item.id, operation, "NFC operation completed"),
            Err(e) => warn!(item_id = %item.id, operation, error = %e, "NFC operation failed"),
        }
        result.into()
    }

    fn provide_input(&self, response: UserInputResponse<NfcInputValue>) -> bool {
        self.channels.provide_input(response)
    }

    async fn abort(&self, item: Option<&NfcQueueItem>) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            debug!("No NFC operation running, abort ignored");
            return false;
        }
        self.abort_requested.store(true, Ordering::SeqCst);
        info!(item_id = ?item.map(|i| i.id.as_str()), "Aborting NFC operation");

        self.channels.emit(NfcEvent::Cancelled);
        let cancelled = self.channels.cancel_pending();
        if cancelled > 0 {
            debug!(cancelled, "Pending NFC input requests cancelled");
        }
        self.recovery.abort();
        self.transport.abort_detection();
        self.transport.stop_antenna();
        true
    }
}
