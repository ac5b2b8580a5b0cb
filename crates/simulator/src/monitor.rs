// Session monitor - logs queue state transitions and processor progress

use ticpass_core::application::HybridQueueManager;
use ticpass_core::domain::ProcessingState;
use ticpass_nfc::processor::{NfcEvent, NfcOutput};
use ticpass_nfc::{NfcProcessor, NfcQueueItem};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub fn spawn(manager: &HybridQueueManager<NfcProcessor>) -> JoinHandle<()> {
    let mut state = manager.subscribe_state();
    let mut events = manager.subscribe_processor_events();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = state.borrow_and_update().clone();
                    log_state(&current);
                }
                event = events.recv() => match event {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Processor events lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

fn log_state(state: &ProcessingState<NfcQueueItem, NfcOutput>) {
    match state {
        ProcessingState::ItemProcessing(item) => info!(
            item_id = %item.id,
            operation = item.operation.name(),
            "Processing"
        ),
        ProcessingState::ItemDone { item, output } => info!(
            item_id = %item.id,
            operation = item.operation.name(),
            output = ?output,
            "Done"
        ),
        ProcessingState::ItemFailed { item, error } => warn!(
            item_id = %item.id,
            operation = item.operation.name(),
            error = %error,
            "Failed"
        ),
        other => info!(state = other.name(), "Queue state"),
    }
}

fn log_event(event: &NfcEvent) {
    match event {
        // One per recovered key, too chatty for info
        NfcEvent::KeyFound { .. } => debug!(event = ?event, "NFC"),
        _ => info!(event = ?event, "NFC"),
    }
}
