// Domain Layer - Pure queue contracts and value types

pub mod error;
pub mod input;
pub mod item;
pub mod queue;
pub mod result;
pub mod state;

// Re-exports
pub use error::ErrorEvent;
pub use input::{
    ErrorHandlingAction, QueueInputKind, QueueInputRequest, QueueInputResponse, QueueInputValue,
    RequestId, UserInputRequest, UserInputResponse,
};
pub use item::{sort_by_priority, ItemId, Priority, QueueItem, QueueItemStatus};
pub use queue::{
    AbortCurrentPolicy, ManagerConfig, PersistenceStrategy, ProcessorStartMode, QueueProgress,
};
pub use result::ProcessingResult;
pub use state::ProcessingState;
