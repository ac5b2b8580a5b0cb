// Application Layer - Queue runtime and suspension protocol

pub mod manager;
pub mod suspension;

// Re-exports
pub use manager::HybridQueueManager;
pub use suspension::{PendingRequests, ProcessorChannels};
