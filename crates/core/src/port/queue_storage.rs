// Queue Storage Port (Interface)

use crate::domain::{QueueItem, QueueItemStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Durable mirror of the in-memory queue.
///
/// Every operation must be idempotent: the manager may replay an insert for an
/// item that already exists, or remove one that is already gone.
#[async_trait]
pub trait QueueStorage<T: QueueItem>: Send + Sync {
    /// Insert or replace the item
    async fn insert(&self, item: &T) -> Result<()>;

    /// Replace payload and status of an existing item (no-op if absent)
    async fn update(&self, item: &T) -> Result<()>;

    /// Set only the status column
    async fn update_status(&self, item: &T, status: QueueItemStatus) -> Result<()>;

    async fn remove(&self, item: &T) -> Result<()>;

    /// Returns number of removed items
    async fn remove_by_status(&self, statuses: &[QueueItemStatus]) -> Result<u64>;

    /// Union over all given statuses, highest priority first
    async fn get_all_by_status(&self, statuses: &[QueueItemStatus]) -> Result<Vec<T>>;
}

// ============================================================================
// In-memory implementation (tests, demos, memory-only shells)
// ============================================================================

pub mod memory {
    use super::*;
    use crate::domain::sort_by_priority;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct InMemoryQueueStorage<T> {
        items: Mutex<Vec<T>>,
        writes: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl<T: QueueItem> Default for InMemoryQueueStorage<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: QueueItem> InMemoryQueueStorage<T> {
        pub fn new() -> Self {
            Self {
                items: Mutex::new(Vec::new()),
                writes: AtomicUsize::new(0),
                fail_writes: AtomicBool::new(false),
            }
        }

        /// Pre-populate (e.g. to simulate a previous session)
        pub fn with_items(items: Vec<T>) -> Self {
            let storage = Self::new();
            *storage.lock() = items;
            storage
        }

        /// Make every subsequent write fail
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Number of mutating calls received
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn snapshot(&self) -> Vec<T> {
            self.lock().clone()
        }

        pub fn get(&self, id: &str) -> Option<T> {
            self.lock().iter().find(|i| i.id() == id).cloned()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
            // A poisoned lock only means a test thread panicked mid-write
            self.items.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn begin_write(&self) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("injected write failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<T: QueueItem> QueueStorage<T> for InMemoryQueueStorage<T> {
        async fn insert(&self, item: &T) -> Result<()> {
            self.begin_write()?;
            let mut items = self.lock();
            match items.iter_mut().find(|i| i.id() == item.id()) {
                Some(existing) => *existing = item.clone(),
                None => items.push(item.clone()),
            }
            Ok(())
        }

        async fn update(&self, item: &T) -> Result<()> {
            self.begin_write()?;
            if let Some(existing) = self.lock().iter_mut().find(|i| i.id() == item.id()) {
                *existing = item.clone();
            }
            Ok(())
        }

        async fn update_status(&self, item: &T, status: QueueItemStatus) -> Result<()> {
            self.begin_write()?;
            if let Some(existing) = self.lock().iter_mut().find(|i| i.id() == item.id()) {
                existing.set_status(status);
            }
            Ok(())
        }

        async fn remove(&self, item: &T) -> Result<()> {
            self.begin_write()?;
            self.lock().retain(|i| i.id() != item.id());
            Ok(())
        }

        async fn remove_by_status(&self, statuses: &[QueueItemStatus]) -> Result<u64> {
            self.begin_write()?;
            let mut items = self.lock();
            let before = items.len();
            items.retain(|i| !statuses.contains(&i.status()));
            Ok((before - items.len()) as u64)
        }

        async fn get_all_by_status(&self, statuses: &[QueueItemStatus]) -> Result<Vec<T>> {
            let mut found: Vec<T> = self
                .lock()
                .iter()
                .filter(|i| statuses.contains(&i.status()))
                .cloned()
                .collect();
            sort_by_priority(&mut found);
            Ok(found)
        }
    }

}
