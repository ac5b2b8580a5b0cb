// Ordered fire-and-forget persistence
//
// The manager never awaits routine storage writes, but they must reach storage
// in the order they were issued (an update must not overtake its insert). A
// single writer task drains an unbounded channel sequentially.
//
// Under ON_BACKGROUND the writer only records the latest copy of each touched
// item; nothing is sent until `persist_pending` (or a clear that needs storage
// to be exact) asks for it.

use crate::domain::{PersistenceStrategy, QueueItem, QueueItemStatus};
use crate::port::QueueStorage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum StorageOp<T> {
    Insert(T),
    Update(T),
    UpdateStatus(T, QueueItemStatus),
    Flush(oneshot::Sender<()>),
}

pub(crate) struct PersistenceWriter<T> {
    tx: mpsc::UnboundedSender<StorageOp<T>>,
    storage: Arc<dyn QueueStorage<T>>,
    /// Dirty items in first-touched order (ON_BACKGROUND only)
    deferred: Option<Mutex<Vec<T>>>,
}

impl<T: QueueItem> PersistenceWriter<T> {
    /// Spawn the writer task (requires a Tokio runtime)
    pub fn spawn(storage: Arc<dyn QueueStorage<T>>, strategy: PersistenceStrategy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&storage), rx));
        let deferred =
            (strategy == PersistenceStrategy::OnBackground).then(|| Mutex::new(Vec::new()));
        Self {
            tx,
            storage,
            deferred,
        }
    }

    /// Storage port for awaited operations; call `flush` first
    pub fn storage(&self) -> &Arc<dyn QueueStorage<T>> {
        &self.storage
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn insert(&self, item: &T) {
        if !self.defer(item.clone()) {
            self.send(StorageOp::Insert(item.clone()));
        }
    }

    pub fn update(&self, item: &T) {
        if !self.defer(item.clone()) {
            self.send(StorageOp::Update(item.clone()));
        }
    }

    pub fn update_status(&self, item: &T, status: QueueItemStatus) {
        let mut latest = item.clone();
        latest.set_status(status);
        if !self.defer(latest) {
            self.send(StorageOp::UpdateStatus(item.clone(), status));
        }
    }

    /// Drop the dirty copy of an item that is about to be removed
    pub fn forget(&self, id: &str) {
        if let Some(mut dirty) = self.dirty() {
            dirty.retain(|i| i.id() != id);
        }
    }

    /// Number of items waiting for `persist_pending`
    pub fn pending_count(&self) -> usize {
        self.dirty().map_or(0, |dirty| dirty.len())
    }

    /// Write every dirty item and wait for storage. Returns how many were written.
    pub async fn persist_pending(&self) -> usize {
        self.persist_dirty(|_| true).await
    }

    /// Write dirty items whose status is in `statuses`, so an awaited
    /// `remove_by_status` sees them
    pub async fn persist_with_status(&self, statuses: &[QueueItemStatus]) -> usize {
        self.persist_dirty(|item| statuses.contains(&item.status()))
            .await
    }

    /// Write `items` as they are now, discarding dirty tracking
    pub async fn persist_all(&self, items: Vec<T>) -> usize {
        if let Some(mut dirty) = self.dirty() {
            dirty.clear();
        }
        let count = items.len();
        for item in items {
            self.send(StorageOp::Insert(item));
        }
        self.flush().await;
        count
    }

    /// Wait until every write issued so far has been applied
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(StorageOp::Flush(ack_tx));
        let _ = ack_rx.await;
    }

    fn dirty(&self) -> Option<MutexGuard<'_, Vec<T>>> {
        self.deferred
            .as_ref()
            .map(|dirty| dirty.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Record the latest copy instead of writing. False when writes go out
    /// immediately.
    fn defer(&self, item: T) -> bool {
        let Some(mut dirty) = self.dirty() else {
            return false;
        };
        match dirty.iter_mut().find(|i| i.id() == item.id()) {
            Some(existing) => *existing = item,
            None => dirty.push(item),
        }
        true
    }

    async fn persist_dirty(&self, select: impl Fn(&T) -> bool) -> usize {
        let selected: Vec<T> = match self.dirty() {
            Some(mut dirty) => {
                let (selected, kept): (Vec<T>, Vec<T>) = dirty.drain(..).partition(|i| select(i));
                *dirty = kept;
                selected
            }
            None => return 0,
        };
        let count = selected.len();
        for item in selected {
            self.send(StorageOp::Insert(item));
        }
        self.flush().await;
        if count > 0 {
            info!(count, "Deferred queue items persisted");
        }
        count
    }

    fn send(&self, op: StorageOp<T>) {
        if self.tx.send(op).is_err() {
            warn!("Persistence writer stopped, dropping storage write");
        }
    }
}

async fn run_writer<T: QueueItem>(
    storage: Arc<dyn QueueStorage<T>>,
    mut rx: mpsc::UnboundedReceiver<StorageOp<T>>,
) {
    while let Some(op) = rx.recv().await {
        let (item_id, result) = match op {
            StorageOp::Insert(item) => (item.id().to_string(), storage.insert(&item).await),
            StorageOp::Update(item) => (item.id().to_string(), storage.update(&item).await),
            StorageOp::UpdateStatus(item, status) => (
                item.id().to_string(),
                storage.update_status(&item, status).await,
            ),
            StorageOp::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        match result {
            Ok(()) => debug!(item_id = %item_id, "Queue item persisted"),
            Err(e) => warn!(item_id = %item_id, error = %e, "Queue storage write failed"),
        }
    }
    debug!("Persistence writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::fixtures::TestItem;
    use crate::port::queue_storage::memory::InMemoryQueueStorage;

    fn writer(
        strategy: PersistenceStrategy,
    ) -> (Arc<InMemoryQueueStorage<TestItem>>, PersistenceWriter<TestItem>) {
        let storage = Arc::new(InMemoryQueueStorage::<TestItem>::new());
        let writer = PersistenceWriter::spawn(
            storage.clone() as Arc<dyn QueueStorage<TestItem>>,
            strategy,
        );
        (storage, writer)
    }

    #[tokio::test]
    async fn test_writes_apply_in_order() {
        let (storage, writer) = writer(PersistenceStrategy::Immediate);

        let item = TestItem::new("a", 1);
        writer.insert(&item);
        writer.update_status(&item, QueueItemStatus::Processing);
        writer.update_status(&item, QueueItemStatus::Completed);
        writer.flush().await;

        assert_eq!(
            storage.get("a").map(|i| i.status),
            Some(QueueItemStatus::Completed)
        );
        assert_eq!(storage.write_count(), 3);
        assert_eq!(writer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_writer() {
        let (storage, writer) = writer(PersistenceStrategy::Immediate);

        storage.set_fail_writes(true);
        writer.insert(&TestItem::new("lost", 1));
        writer.flush().await;

        storage.set_fail_writes(false);
        writer.insert(&TestItem::new("kept", 1));
        writer.flush().await;

        assert!(storage.get("lost").is_none());
        assert!(storage.get("kept").is_some());
    }

    #[tokio::test]
    async fn test_deferred_writes_wait_for_persist() {
        let (storage, writer) = writer(PersistenceStrategy::OnBackground);

        let a = TestItem::new("a", 1);
        let mut b = TestItem::new("b", 2);
        writer.insert(&a);
        writer.insert(&b);
        b.label = "edited".to_string();
        writer.update(&b);
        writer.update_status(&a, QueueItemStatus::Processing);
        writer.flush().await;

        assert_eq!(storage.write_count(), 0);
        assert_eq!(writer.pending_count(), 2);

        assert_eq!(writer.persist_pending().await, 2);
        assert_eq!(writer.pending_count(), 0);
        assert_eq!(storage.write_count(), 2);
        assert_eq!(
            storage.get("a").map(|i| i.status),
            Some(QueueItemStatus::Processing)
        );
        assert_eq!(storage.get("b").map(|i| i.label), Some("edited".to_string()));

        // Nothing left to write
        assert_eq!(writer.persist_pending().await, 0);
    }

    #[tokio::test]
    async fn test_deferred_partial_persist_and_forget() {
        let (storage, writer) = writer(PersistenceStrategy::OnBackground);

        let done = TestItem::new("done", 1);
        writer.insert(&done);
        writer.update_status(&done, QueueItemStatus::Completed);
        writer.insert(&TestItem::new("waiting", 1));
        writer.insert(&TestItem::new("dropped", 1));
        writer.forget("dropped");

        assert_eq!(
            writer
                .persist_with_status(&[QueueItemStatus::Completed])
                .await,
            1
        );
        assert!(storage.get("done").is_some());
        assert!(storage.get("waiting").is_none());
        assert_eq!(writer.pending_count(), 1);

        assert_eq!(writer.persist_all(vec![TestItem::new("x", 0)]).await, 1);
        assert_eq!(writer.pending_count(), 0);
        assert!(storage.get("x").is_some());
        assert!(storage.get("dropped").is_none());
    }
}
