// Ticpass Infrastructure - SQLite Adapter
// Implements: QueueStorage

mod connection;
mod error;
mod migration;
mod queue_storage;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use queue_storage::SqliteQueueStorage;

// Re-exported so callers do not need a direct sqlx dependency
pub use sqlx::SqlitePool;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
