// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod queue_processor;
pub mod queue_storage;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use queue_processor::QueueProcessor;
pub use queue_storage::QueueStorage;
pub use time_provider::TimeProvider;
