// Queue Configuration

use serde::{Deserialize, Serialize};

/// Whether queue mutations are mirrored to `QueueStorage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceStrategy {
    /// Every mutation schedules a storage write right away
    #[default]
    Immediate,
    /// Mutations are tracked as dirty and written on demand
    /// (`persist_pending_items`, e.g. when the app goes to background)
    OnBackground,
    /// Memory only
    Never,
}

/// Whether each item waits for a human go-ahead before dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorStartMode {
    #[default]
    Immediate,
    Confirmation,
}

/// What `AbortCurrent` does to the failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortCurrentPolicy {
    /// Item stays queued (moved behind runnable work) with status CANCELLED.
    /// The loop skips it; `remove`/`clear_queue` get rid of it.
    #[default]
    CancelInPlace,
    /// Item is dequeued and marked FAILED in storage
    Remove,
}

/// Hybrid queue manager configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub persistence: PersistenceStrategy,
    pub start_mode: ProcessorStartMode,
    pub abort_current: AbortCurrentPolicy,
}

impl ManagerConfig {
    pub fn new(persistence: PersistenceStrategy, start_mode: ProcessorStartMode) -> Self {
        Self {
            persistence,
            start_mode,
            abort_current: AbortCurrentPolicy::default(),
        }
    }

    pub fn with_abort_current(mut self, policy: AbortCurrentPolicy) -> Self {
        self.abort_current = policy;
        self
    }

    /// True unless the queue is memory only
    pub fn persists(&self) -> bool {
        self.persistence != PersistenceStrategy::Never
    }
}

/// Counters for "item N of M" displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProgress {
    /// Items seen this session (processed + still queued)
    pub full_size: usize,
    /// Items still waiting or in flight
    pub enqueued_size: usize,
    /// 1-based index of the current item within `full_size`
    pub current_index: usize,
}

impl QueueProgress {
    pub fn new(full_size: usize, enqueued_size: usize) -> Self {
        Self {
            full_size,
            enqueued_size,
            current_index: full_size.saturating_sub(enqueued_size) + 1,
        }
    }
}
