// Processing State (observable by UI collaborators)

use super::ErrorEvent;

/// Live state of the processing loop.
///
/// Published through a watch channel, so late subscribers see the latest value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingState<T, O> {
    Idle,
    ItemProcessing(T),
    ItemRetrying(T),
    ItemDone { item: T, output: O },
    ItemFailed { item: T, error: ErrorEvent },
    ItemSkipped(T),
    ItemAborted(T),
    QueueDone,
    QueueAborted,
}

impl<T, O> ProcessingState<T, O> {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingState::Idle => "IDLE",
            ProcessingState::ItemProcessing(_) => "ITEM_PROCESSING",
            ProcessingState::ItemRetrying(_) => "ITEM_RETRYING",
            ProcessingState::ItemDone { .. } => "ITEM_DONE",
            ProcessingState::ItemFailed { .. } => "ITEM_FAILED",
            ProcessingState::ItemSkipped(_) => "ITEM_SKIPPED",
            ProcessingState::ItemAborted(_) => "ITEM_ABORTED",
            ProcessingState::QueueDone => "QUEUE_DONE",
            ProcessingState::QueueAborted => "QUEUE_ABORTED",
        }
    }

    /// True once the loop has stopped on its own
    pub fn is_final(&self) -> bool {
        matches!(self, ProcessingState::QueueDone | ProcessingState::QueueAborted)
    }
}
