// Queue manager constants (No magic values)
use crate::domain::QueueItemStatus;

/// Buffer of the queue-level input request broadcast
pub const QUEUE_INPUT_CHANNEL_CAPACITY: usize = 16;

/// Buffer of each processor's event broadcast
/// Slow readers lag (and skip) instead of blocking the publisher
pub const PROCESSOR_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Buffer of each processor's input request broadcast
pub const PROCESSOR_INPUT_CHANNEL_CAPACITY: usize = 16;

/// Advisory timeout attached to retry/skip prompts (30s)
/// The UI collaborator enforces it and answers "skip" on expiry
pub const DEFAULT_ERROR_PROMPT_TIMEOUT_MS: u64 = 30_000;

/// Statuses removed from storage by `clear_queue` and `AbortAll`
/// Finished rows are history and only `clear_completed` sweeps them
pub const CLEARABLE_STATUSES: [QueueItemStatus; 2] =
    [QueueItemStatus::Pending, QueueItemStatus::Processing];

/// Statuses removed by `clear_completed`
pub const TERMINAL_STATUSES: [QueueItemStatus; 2] =
    [QueueItemStatus::Completed, QueueItemStatus::Failed];

/// Statuses restored into memory on startup
pub const RESTORABLE_STATUSES: [QueueItemStatus; 2] =
    [QueueItemStatus::Pending, QueueItemStatus::Processing];
