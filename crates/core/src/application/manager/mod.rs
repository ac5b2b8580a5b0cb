// Hybrid Queue Manager - in-memory priority queue mirrored (optionally) to storage

pub mod constants;
mod panic_guard;
mod persistence;

pub use panic_guard::{guard_async, PanicGuardResult};

use crate::application::suspension::PendingRequests;
use crate::domain::{
    sort_by_priority, AbortCurrentPolicy, ErrorEvent, ErrorHandlingAction, ManagerConfig,
    ProcessingResult, ProcessingState, ProcessorStartMode, QueueInputKind, QueueInputRequest,
    QueueInputResponse, QueueItem, QueueItemStatus, QueueProgress, UserInputRequest,
    UserInputResponse,
};
use crate::error::Result;
use crate::port::id_provider::UuidProvider;
use crate::port::{IdProvider, QueueProcessor, QueueStorage};
use constants::*;
use persistence::PersistenceWriter;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type StateOf<P> = ProcessingState<<P as QueueProcessor>::Item, <P as QueueProcessor>::Output>;

/// Runs queued items one at a time through a `QueueProcessor`.
///
/// Cheap to clone; clones share the same queue and processing loop.
pub struct HybridQueueManager<P: QueueProcessor> {
    inner: Arc<Inner<P>>,
}

impl<P: QueueProcessor> Clone for HybridQueueManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P: QueueProcessor> {
    config: ManagerConfig,
    processor: Arc<P>,
    persistence: Option<PersistenceWriter<P::Item>>,
    ids: Arc<dyn IdProvider>,
    queue: Mutex<Vec<P::Item>>,
    queue_tx: watch::Sender<Vec<P::Item>>,
    state_tx: watch::Sender<StateOf<P>>,
    requests_tx: broadcast::Sender<QueueInputRequest>,
    /// Unanswered queue request, replayed to late subscribers
    current_request_tx: watch::Sender<Option<QueueInputRequest>>,
    pending: PendingRequests<QueueInputResponse>,
    is_processing: AtomicBool,
    /// Mirrors `is_processing` for `join` waiters
    running_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Items completed this session (progress counters)
    completed: AtomicUsize,
}

enum LoopControl {
    Continue,
    Stop,
}

/// Clears `is_processing` when the loop exits, including when its task is torn down.
/// Disarmed once the loop has released the flag itself, so a loop started
/// after that point keeps its own flag.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
    running: &'a watch::Sender<bool>,
    armed: bool,
}

impl ProcessingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::SeqCst);
            self.running.send_replace(false);
        }
    }
}

impl<P: QueueProcessor> HybridQueueManager<P> {
    /// Create a manager. Must be called within a Tokio runtime unless the
    /// persistence strategy is `Never` (spawns the storage writer).
    pub fn new(
        storage: Arc<dyn QueueStorage<P::Item>>,
        processor: Arc<P>,
        config: ManagerConfig,
    ) -> Self {
        Self::with_id_provider(storage, processor, config, Arc::new(UuidProvider))
    }

    /// Create a manager with a custom request id source (deterministic tests)
    pub fn with_id_provider(
        storage: Arc<dyn QueueStorage<P::Item>>,
        processor: Arc<P>,
        config: ManagerConfig,
        ids: Arc<dyn IdProvider>,
    ) -> Self {
        let persistence = config
            .persists()
            .then(|| PersistenceWriter::spawn(storage, config.persistence));
        let (queue_tx, _) = watch::channel(Vec::new());
        let (state_tx, _) = watch::channel(ProcessingState::Idle);
        let (requests_tx, _) = broadcast::channel(QUEUE_INPUT_CHANNEL_CAPACITY);
        let (running_tx, _) = watch::channel(false);
        let (current_request_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                config,
                processor,
                persistence,
                ids,
                queue: Mutex::new(Vec::new()),
                queue_tx,
                state_tx,
                requests_tx,
                current_request_tx,
                pending: PendingRequests::new(),
                is_processing: AtomicBool::new(false),
                running_tx,
                worker: Mutex::new(None),
                completed: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.inner.processor
    }

    /// Load PENDING/PROCESSING items left in storage by a previous session.
    ///
    /// Interrupted PROCESSING items go back to PENDING. Items already in memory
    /// are not duplicated. Returns the number of restored items.
    pub async fn restore(&self) -> Result<usize> {
        let Some(writer) = &self.inner.persistence else {
            return Ok(0);
        };
        writer.flush().await;
        let stored = writer
            .storage()
            .get_all_by_status(&RESTORABLE_STATUSES)
            .await?;

        let (restored, interrupted) = self.inner.mutate(|queue| {
            let mut restored = 0;
            let mut interrupted = Vec::new();
            for mut item in stored {
                if queue.iter().any(|q| q.id() == item.id()) {
                    continue;
                }
                if item.status() == QueueItemStatus::Processing {
                    item.set_status(QueueItemStatus::Pending);
                    interrupted.push(item.clone());
                }
                queue.push(item);
                restored += 1;
            }
            sort_by_priority(queue);
            (restored, interrupted)
        });

        for item in &interrupted {
            writer.update_status(item, QueueItemStatus::Pending);
        }
        info!(
            restored,
            interrupted = interrupted.len(),
            "Restored queue items from storage"
        );
        Ok(restored)
    }

    /// Add an item (status forced to PENDING) and re-sort by priority.
    ///
    /// Duplicate ids are not rejected.
    pub fn enqueue(&self, mut item: P::Item) {
        item.set_status(QueueItemStatus::Pending);
        info!(item_id = %item.id(), priority = item.priority(), "Item enqueued");

        if let Some(writer) = &self.inner.persistence {
            writer.insert(&item);
        }
        self.inner.mutate(|queue| {
            queue.push(item);
            sort_by_priority(queue);
        });
    }

    /// Start the processing loop. Returns false if it is already running.
    pub fn start_processing(&self) -> bool {
        let mut worker = self.inner.worker();
        if self.inner.is_processing.swap(true, Ordering::SeqCst) {
            debug!("Processing already running, start ignored");
            return false;
        }
        self.inner.running_tx.send_replace(true);
        *worker = Some(tokio::spawn(Arc::clone(&self.inner).run_loop()));
        true
    }

    pub fn is_processing(&self) -> bool {
        self.inner.is_processing.load(Ordering::SeqCst)
    }

    /// Wait for the current processing loop (if any) to finish on its own.
    ///
    /// Dropping the future leaves the loop running and still abortable.
    pub async fn join(&self) {
        let mut running = self.inner.running_tx.subscribe();
        // The sender lives in `inner`, so the channel cannot close under us
        let _ = running.wait_for(|running| !*running).await;
    }

    /// Queue head
    pub fn current_item(&self) -> Option<P::Item> {
        self.inner.queue().first().cloned()
    }

    /// Replace the queue head with an edited copy (same id). A no-op returning
    /// false if the head has already advanced to another item.
    pub fn replace_current_item(&self, modified: P::Item) -> bool {
        let id = modified.id().to_string();
        let replaced = self.inner.mutate(|queue| match queue.first_mut() {
            Some(head) if head.id() == modified.id() => {
                let status = head.status();
                *head = modified;
                head.set_status(status);
                Some(head.clone())
            }
            _ => None,
        });

        match replaced {
            Some(item) => {
                debug!(item_id = %item.id(), "Current item replaced");
                if let Some(writer) = &self.inner.persistence {
                    writer.update(&item);
                }
                true
            }
            None => {
                debug!(item_id = %id, "Replace ignored, item is no longer current");
                false
            }
        }
    }

    /// Remove one item. Stops any in-flight processing first; storage is
    /// updated before returning.
    pub async fn remove(&self, item: &P::Item) -> Result<()> {
        self.stop_worker().await;
        self.inner
            .mutate(|queue| queue.retain(|i| i.id() != item.id()));

        if let Some(writer) = &self.inner.persistence {
            writer.forget(item.id());
            writer.flush().await;
            writer.storage().remove(item).await?;
        }
        info!(item_id = %item.id(), "Item removed");
        Ok(())
    }

    /// Remove every non-terminal item. Stops any in-flight processing first;
    /// storage is updated before returning. FAILED/COMPLETED rows in storage
    /// are kept.
    pub async fn clear_queue(&self) -> Result<u64> {
        self.stop_worker().await;
        let removed = self.inner.purge_all().await?;
        self.inner.publish_state(ProcessingState::Idle);
        info!(removed, "Queue cleared");
        Ok(removed)
    }

    /// Sweep COMPLETED/FAILED items from memory and storage
    pub async fn clear_completed(&self) -> Result<u64> {
        let in_memory = self.inner.mutate(|queue| {
            let before = queue.len();
            queue.retain(|i| !i.status().is_terminal());
            (before - queue.len()) as u64
        });

        let removed = match &self.inner.persistence {
            Some(writer) => {
                writer.persist_with_status(&TERMINAL_STATUSES).await;
                writer
                    .storage()
                    .remove_by_status(&TERMINAL_STATUSES)
                    .await?
            }
            None => in_memory,
        };
        debug!(removed, "Completed items cleared");
        Ok(removed)
    }

    /// Stop in-flight processing without removing anything. Interrupted items
    /// go back to PENDING. Returns false (no-op) if nothing was running.
    pub async fn abort(&self) -> bool {
        let was_running = self.stop_worker().await;
        if was_running {
            match self.current_item() {
                Some(item) => self
                    .inner
                    .publish_state(ProcessingState::ItemAborted(item)),
                None => self.inner.publish_state(ProcessingState::Idle),
            }
            info!("Processing aborted");
        }
        was_running
    }

    /// Resolve a suspended queue-level request. Unknown or already-resolved
    /// ids are ignored with a warning.
    pub fn provide_queue_input(&self, response: QueueInputResponse) -> bool {
        let request_id = response.request_id.clone();
        let resolved = self.inner.pending.resolve(&request_id, response);
        if resolved {
            self.inner.clear_current_request(&request_id);
        } else {
            warn!(request_id = %request_id, "No pending queue request for response");
        }
        resolved
    }

    /// Forward a processor-level response
    pub fn provide_processor_input(&self, response: UserInputResponse<P::InputValue>) -> bool {
        self.inner.processor.provide_input(response)
    }

    /// Ordered snapshot of the in-memory queue
    pub fn items(&self) -> Vec<P::Item> {
        self.inner.queue().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue().is_empty()
    }

    /// "Item N of M" counters
    pub async fn progress(&self) -> Result<QueueProgress> {
        match &self.inner.persistence {
            Some(writer) if !writer.is_deferred() => {
                writer.flush().await;
                let storage = writer.storage();
                let enqueued = storage.get_all_by_status(&RESTORABLE_STATUSES).await?;
                let finished = storage.get_all_by_status(&TERMINAL_STATUSES).await?;
                Ok(QueueProgress::new(
                    enqueued.len() + finished.len(),
                    enqueued.len(),
                ))
            }
            _ => {
                let enqueued = self
                    .inner
                    .queue()
                    .iter()
                    .filter(|i| i.status().is_runnable())
                    .count();
                let completed = self.inner.completed.load(Ordering::SeqCst);
                Ok(QueueProgress::new(completed + enqueued, enqueued))
            }
        }
    }

    /// Wait until all fire-and-forget storage writes issued so far are applied
    pub async fn flush_storage(&self) {
        if let Some(writer) = &self.inner.persistence {
            writer.flush().await;
        }
    }

    /// Write every item touched since the last persist (ON_BACKGROUND).
    /// Call when the app goes to background. Returns the number written.
    pub async fn persist_pending_items(&self) -> usize {
        match &self.inner.persistence {
            Some(writer) => writer.persist_pending().await,
            None => 0,
        }
    }

    pub fn has_pending_persistence(&self) -> bool {
        self.pending_persistence_count() > 0
    }

    /// Items touched but not yet written (always 0 unless ON_BACKGROUND)
    pub fn pending_persistence_count(&self) -> usize {
        self.inner
            .persistence
            .as_ref()
            .map_or(0, |writer| writer.pending_count())
    }

    /// Write the whole in-memory queue as it is now and wait for storage.
    /// No-op when the queue is memory only.
    pub async fn force_persist(&self) -> usize {
        let Some(writer) = &self.inner.persistence else {
            return 0;
        };
        let written = writer.persist_all(self.items()).await;
        info!(written, "Queue force-persisted");
        written
    }

    /// Live ordered view of the queue
    pub fn subscribe_queue(&self) -> watch::Receiver<Vec<P::Item>> {
        self.inner.queue_tx.subscribe()
    }

    /// Live processing state (latest value replayed to new subscribers)
    pub fn subscribe_state(&self) -> watch::Receiver<StateOf<P>> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_queue_input_requests(&self) -> broadcast::Receiver<QueueInputRequest> {
        self.inner.requests_tx.subscribe()
    }

    /// The queue request the loop is suspended on, if any
    pub fn pending_queue_input(&self) -> Option<QueueInputRequest> {
        self.inner.current_request_tx.borrow().clone()
    }

    /// Unanswered queue request, current value included (None once answered)
    pub fn subscribe_pending_queue_input(&self) -> watch::Receiver<Option<QueueInputRequest>> {
        self.inner.current_request_tx.subscribe()
    }

    pub fn subscribe_processor_events(&self) -> broadcast::Receiver<P::Event> {
        self.inner.processor.subscribe_events()
    }

    pub fn subscribe_processor_input_requests(
        &self,
    ) -> broadcast::Receiver<UserInputRequest<P::InputKind>> {
        self.inner.processor.subscribe_input_requests()
    }

    /// Tear down the processing loop (if any) and unblock its suspensions.
    /// Returns true if a loop was actually running.
    async fn stop_worker(&self) -> bool {
        let handle = self.inner.worker().take();
        let mut was_running = false;

        if let Some(handle) = handle {
            was_running = !handle.is_finished();
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = ?e, "Processing loop panicked");
                }
            }
        }
        // The task may have been torn down before its guard existed
        self.inner.is_processing.store(false, Ordering::SeqCst);
        self.inner.running_tx.send_replace(false);

        if was_running {
            self.inner.abort_processor(None).await;
        }
        let cancelled = self
            .inner
            .pending
            .cancel_all(|id| QueueInputResponse::cancelled(id));
        if cancelled > 0 {
            debug!(cancelled, "Cancelled pending queue requests");
        }
        self.inner.current_request_tx.send_replace(None);

        let interrupted = self.inner.mutate(|queue| {
            let mut interrupted = Vec::new();
            for item in queue.iter_mut() {
                if item.status() == QueueItemStatus::Processing {
                    item.set_status(QueueItemStatus::Pending);
                    interrupted.push(item.clone());
                }
            }
            interrupted
        });
        for item in &interrupted {
            self.inner.persist_status(item, QueueItemStatus::Pending);
        }
        was_running
    }
}

impl<P: QueueProcessor> Inner<P> {
    fn queue(&self) -> MutexGuard<'_, Vec<P::Item>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a mutation under the lock, then publish the new ordering
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<P::Item>) -> R) -> R {
        let (result, snapshot) = {
            let mut queue = self.queue();
            let result = f(&mut queue);
            (result, queue.clone())
        };
        self.queue_tx.send_replace(snapshot);
        result
    }

    fn publish_state(&self, state: StateOf<P>) {
        debug!(state = state.name(), "Processing state changed");
        self.state_tx.send_replace(state);
    }

    fn persist_status(&self, item: &P::Item, status: QueueItemStatus) {
        if let Some(writer) = &self.persistence {
            writer.update_status(item, status);
        }
    }

    async fn run_loop(self: Arc<Self>) {
        let mut guard = ProcessingGuard {
            flag: &self.is_processing,
            running: &self.running_tx,
            armed: true,
        };
        info!("Queue processing started");

        loop {
            let Some(head) = self.next_runnable_or_finish() else {
                guard.disarm();
                info!("Queue processing finished");
                break;
            };
            let head_id = head.id().to_string();

            if self.config.start_mode == ProcessorStartMode::Confirmation {
                let kind = self.confirmation_request(&head);
                let response = self.ask(kind, None).await;
                if !response.is_confirmed() {
                    info!(item_id = %head_id, "Item not confirmed, moving to tail");
                    if let Some(skipped) = self.move_to_tail(&head_id, QueueItemStatus::Pending) {
                        self.publish_state(ProcessingState::ItemSkipped(skipped));
                    }
                    continue;
                }
            }

            if let LoopControl::Stop = self.run_item(&head_id).await {
                break;
            }
        }
    }

    /// Process one item until it completes or a recovery decision moves on
    async fn run_item(&self, id: &str) -> LoopControl {
        loop {
            let Some(item) = self.mark_processing(id) else {
                return LoopControl::Continue;
            };
            info!(item_id = %id, priority = item.priority(), "Processing item");
            self.publish_state(ProcessingState::ItemProcessing(item.clone()));

            let result = match guard_async(self.processor.process(&item)).await {
                PanicGuardResult::Success(result) => result,
                PanicGuardResult::Panicked(_) => ProcessingResult::Error(ErrorEvent::Generic),
            };

            let error = match result {
                ProcessingResult::Success(output) => {
                    if let Some(done) = self.take_finished(id, QueueItemStatus::Completed) {
                        self.completed.fetch_add(1, Ordering::SeqCst);
                        info!(item_id = %id, "Item completed");
                        self.publish_state(ProcessingState::ItemDone { item: done, output });
                    }
                    return LoopControl::Continue;
                }
                ProcessingResult::Error(error) => error,
            };

            warn!(item_id = %id, error = ?error, "Item failed, awaiting recovery decision");
            self.publish_state(ProcessingState::ItemFailed {
                item: item.clone(),
                error,
            });

            let kind = QueueInputKind::ErrorRetryOrSkip {
                item_id: id.to_string(),
                error,
            };
            let action = self
                .ask(kind, Some(DEFAULT_ERROR_PROMPT_TIMEOUT_MS))
                .await
                .error_action();
            info!(item_id = %id, action = ?action, "Recovery decision received");

            match action {
                ErrorHandlingAction::RetryImmediately => {
                    self.publish_state(ProcessingState::ItemRetrying(item));
                }
                ErrorHandlingAction::RetryLater => {
                    self.abort_processor(Some(&item)).await;
                    if let Some(skipped) = self.move_to_tail(id, QueueItemStatus::Pending) {
                        self.publish_state(ProcessingState::ItemSkipped(skipped));
                    }
                    return LoopControl::Continue;
                }
                ErrorHandlingAction::AbortCurrent => {
                    self.abort_processor(Some(&item)).await;
                    let aborted = match self.config.abort_current {
                        AbortCurrentPolicy::CancelInPlace => {
                            self.move_to_tail(id, QueueItemStatus::Cancelled)
                        }
                        AbortCurrentPolicy::Remove => {
                            self.take_finished(id, QueueItemStatus::Failed)
                        }
                    };
                    if let Some(aborted) = aborted {
                        self.publish_state(ProcessingState::ItemAborted(aborted));
                    }
                    return LoopControl::Continue;
                }
                ErrorHandlingAction::AbortAll => {
                    self.abort_processor(None).await;
                    if let Err(e) = self.purge_all().await {
                        warn!(error = %e, "Failed to clear storage after abort-all");
                    }
                    self.publish_state(ProcessingState::QueueAborted);
                    info!("Queue aborted");
                    return LoopControl::Stop;
                }
            }
        }
    }

    /// Bring the first runnable item to the head (cancelled items stay behind it).
    ///
    /// With nothing runnable the loop publishes QueueDone and releases
    /// `is_processing` while still holding the queue lock, so an enqueue racing
    /// with the exit either lands before the check or finds the flag cleared.
    fn next_runnable_or_finish(&self) -> Option<P::Item> {
        let (head, snapshot) = {
            let mut queue = self.queue();
            let Some(index) = queue.iter().position(|i| i.status().is_runnable()) else {
                self.publish_state(ProcessingState::QueueDone);
                self.is_processing.store(false, Ordering::SeqCst);
                self.running_tx.send_replace(false);
                return None;
            };
            queue[..=index].rotate_right(1);
            (queue[0].clone(), queue.clone())
        };
        self.queue_tx.send_replace(snapshot);
        Some(head)
    }

    fn confirmation_request(&self, head: &P::Item) -> QueueInputKind {
        let queue = self.queue();
        let runnable: Vec<&P::Item> = queue.iter().filter(|i| i.status().is_runnable()).collect();
        let done = self.completed.load(Ordering::SeqCst);
        QueueInputKind::ConfirmNextProcessor {
            current_index: done + 1,
            total: done + runnable.len(),
            current_id: head.id().to_string(),
            next_id: runnable.get(1).map(|i| i.id().to_string()),
        }
    }

    /// Publish a queue-level request and suspend until it is answered
    async fn ask(&self, kind: QueueInputKind, timeout_ms: Option<u64>) -> QueueInputResponse {
        let request = QueueInputRequest {
            id: self.ids.generate_id(),
            timeout_ms,
            kind,
        };
        let id = request.id.clone();
        let rx = self.pending.register(&id);
        self.current_request_tx.send_replace(Some(request.clone()));

        debug!(request_id = %id, kind = ?request.kind, "Queue input requested");
        if self.requests_tx.send(request).is_err() {
            debug!(request_id = %id, "No live subscribers, request kept for replay");
        }

        let response = rx
            .await
            .unwrap_or_else(|_| QueueInputResponse::cancelled(id.clone()));
        self.clear_current_request(&id);
        response
    }

    fn clear_current_request(&self, id: &str) {
        self.current_request_tx
            .send_if_modified(|current| match current {
                Some(request) if request.id == id => {
                    *current = None;
                    true
                }
                _ => false,
            });
    }

    async fn abort_processor(&self, item: Option<&P::Item>) -> bool {
        match guard_async(self.processor.abort(item)).await {
            PanicGuardResult::Success(aborted) => aborted,
            PanicGuardResult::Panicked(msg) => {
                warn!(panic_msg = %msg, "Processor abort panicked");
                false
            }
        }
    }

    fn mark_processing(&self, id: &str) -> Option<P::Item> {
        let item = self.mutate(|queue| {
            let item = queue.iter_mut().find(|i| i.id() == id)?;
            item.set_status(QueueItemStatus::Processing);
            Some(item.clone())
        })?;
        self.persist_status(&item, QueueItemStatus::Processing);
        Some(item)
    }

    /// Dequeue an item with its final status
    fn take_finished(&self, id: &str, status: QueueItemStatus) -> Option<P::Item> {
        let item = self.mutate(|queue| {
            let index = queue.iter().position(|i| i.id() == id)?;
            let mut item = queue.remove(index);
            item.set_status(status);
            Some(item)
        })?;
        self.persist_status(&item, status);
        Some(item)
    }

    fn move_to_tail(&self, id: &str, status: QueueItemStatus) -> Option<P::Item> {
        let item = self.mutate(|queue| {
            let index = queue.iter().position(|i| i.id() == id)?;
            let mut item = queue.remove(index);
            item.set_status(status);
            queue.push(item.clone());
            Some(item)
        })?;
        self.persist_status(&item, status);
        Some(item)
    }

    /// Drop every item from memory and PENDING/PROCESSING rows from storage.
    /// Finished rows in storage are history and survive.
    async fn purge_all(&self) -> Result<u64> {
        let in_memory = self.mutate(|queue| {
            let count = queue.len() as u64;
            queue.clear();
            count
        });

        match &self.persistence {
            Some(writer) if !writer.is_deferred() => {
                writer.flush().await;
                writer
                    .storage()
                    .remove_by_status(&CLEARABLE_STATUSES)
                    .await
            }
            Some(writer) => {
                // Count from memory, unwritten items never reached storage
                writer.persist_with_status(&CLEARABLE_STATUSES).await;
                writer
                    .storage()
                    .remove_by_status(&CLEARABLE_STATUSES)
                    .await?;
                Ok(in_memory)
            }
            None => Ok(in_memory),
        }
    }
}
