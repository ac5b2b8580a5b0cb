// Auto-responder - plays the operator for every queue and processor prompt

use std::sync::{Arc, Mutex, PoisonError};
use ticpass_core::application::HybridQueueManager;
use ticpass_core::domain::{
    QueueInputKind, QueueInputRequest, QueueInputResponse, UserInputResponse,
};
use ticpass_nfc::processor::{CustomerDetails, NfcInputKind, NfcInputValue};
use ticpass_nfc::NfcProcessor;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Keys the demo card is formatted with (hex)
pub const DEMO_KEY_A: &str = "A1B2C3D4E5F6";
pub const DEMO_KEY_B: &str = "B1C2D3E4F5A6";

/// Scripted operator. Remembers the PIN shown at setup so it can type it
/// back at authentication.
#[derive(Debug, Default)]
pub struct Operator {
    pin: Mutex<Option<String>>,
}

impl Operator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always go ahead; a failed item is aborted so the session cannot loop
    pub fn answer_queue(&self, request: &QueueInputRequest) -> QueueInputResponse {
        match &request.kind {
            QueueInputKind::ConfirmNextProcessor {
                current_index,
                total,
                ..
            } => {
                info!(current_index, total, "Confirming next item");
                QueueInputResponse::proceed(&request.id)
            }
            QueueInputKind::ErrorRetryOrSkip { item_id, error } => {
                warn!(item_id = %item_id, error = %error, "Item failed, aborting it");
                QueueInputResponse::on_error_abort(&request.id)
            }
        }
    }

    pub fn answer_processor(&self, kind: &NfcInputKind) -> NfcInputValue {
        match kind {
            NfcInputKind::ConfirmKeys => NfcInputValue::Keys {
                key_a: DEMO_KEY_A.to_string(),
                key_b: DEMO_KEY_B.to_string(),
            },
            NfcInputKind::ConfirmCustomerData => NfcInputValue::CustomerData(CustomerDetails {
                name: "Ada Lovelace".to_string(),
                national_id: "18151210".to_string(),
                phone: "+44 20 7946 0000".to_string(),
            }),
            NfcInputKind::SaveCustomerPin { pin } => {
                info!(pin = %pin, "Customer PIN generated");
                *self.pin.lock().unwrap_or_else(PoisonError::into_inner) = Some(pin.clone());
                NfcInputValue::Confirmed(true)
            }
            NfcInputKind::EnterPin { customer_name } => {
                info!(customer = %customer_name, "Entering customer PIN");
                let pin = self.pin.lock().unwrap_or_else(PoisonError::into_inner).clone();
                NfcInputValue::Pin(pin.unwrap_or_default())
            }
        }
    }
}

/// Answer prompts until the manager's channels close (or the task is aborted).
///
/// Subscribes before spawning, so prompts raised right after this call are
/// not missed.
pub fn spawn(manager: HybridQueueManager<NfcProcessor>, operator: Arc<Operator>) -> JoinHandle<()> {
    let mut queue_requests = manager.subscribe_queue_input_requests();
    let mut processor_requests = manager.subscribe_processor_input_requests();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                request = queue_requests.recv() => match request {
                    Ok(request) => {
                        manager.provide_queue_input(operator.answer_queue(&request));
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Queue prompts lagged"),
                    Err(RecvError::Closed) => break,
                },
                request = processor_requests.recv() => match request {
                    Ok(request) => {
                        let value = operator.answer_processor(&request.kind);
                        manager.provide_processor_input(UserInputResponse::new(request.id, value));
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Processor prompts lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}
