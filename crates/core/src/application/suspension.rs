// Suspension Protocol - pending request table + processor channel bundle
//
// A waiter registers its request id *before* the request is published, so a
// responder that answers immediately can never miss it.

use crate::application::manager::constants::{
    PROCESSOR_EVENT_CHANNEL_CAPACITY, PROCESSOR_INPUT_CHANNEL_CAPACITY,
};
use crate::domain::{RequestId, UserInputRequest, UserInputResponse};
use crate::port::IdProvider;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

/// Map from request id to the continuation blocked on it.
///
/// Each id resolves at most once; late or duplicate resolutions are no-ops.
pub struct PendingRequests<R> {
    waiters: Mutex<HashMap<RequestId, oneshot::Sender<R>>>,
}

impl<R: Send> Default for PendingRequests<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send> PendingRequests<R> {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<R>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter; the receiver completes when `resolve` is called
    pub fn register(&self, id: &str) -> oneshot::Receiver<R> {
        let (tx, rx) = oneshot::channel();
        if self.waiters().insert(id.to_string(), tx).is_some() {
            warn!(request_id = %id, "Duplicate request id registered, previous waiter dropped");
        }
        rx
    }

    /// Resolve one waiter. Returns false for unknown, already-resolved or
    /// abandoned ids.
    pub fn resolve(&self, id: &str, response: R) -> bool {
        let Some(tx) = self.waiters().remove(id) else {
            return false;
        };
        tx.send(response).is_ok()
    }

    /// Resolve every waiter with a synthetic response (used on abort)
    pub fn cancel_all(&self, make_response: impl Fn(&str) -> R) -> usize {
        let drained: Vec<_> = self.waiters().drain().collect();
        let count = drained.len();
        for (id, tx) in drained {
            let _ = tx.send(make_response(&id));
        }
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.waiters().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.waiters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event broadcast, input-request broadcast and pending table of one processor.
///
/// `E` is the processor's event type, `K` its input request kind and `V` the
/// value carried back by responses.
pub struct ProcessorChannels<E, K, V> {
    events: broadcast::Sender<E>,
    requests: broadcast::Sender<UserInputRequest<K>>,
    pending: PendingRequests<UserInputResponse<V>>,
    ids: Arc<dyn IdProvider>,
}

impl<E, K, V> ProcessorChannels<E, K, V>
where
    E: Clone + Debug + Send + 'static,
    K: Clone + Debug + Send + 'static,
    V: Send + 'static,
{
    pub fn new(ids: Arc<dyn IdProvider>) -> Self {
        let (events, _) = broadcast::channel(PROCESSOR_EVENT_CHANNEL_CAPACITY);
        let (requests, _) = broadcast::channel(PROCESSOR_INPUT_CHANNEL_CAPACITY);
        Self {
            events,
            requests,
            pending: PendingRequests::new(),
            ids,
        }
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: E) {
        debug!(event = ?event, "Processor event");
        let _ = self.events.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<E> {
        self.events.subscribe()
    }

    pub fn subscribe_requests(&self) -> broadcast::Receiver<UserInputRequest<K>> {
        self.requests.subscribe()
    }

    /// Publish a request and wait for the correlated response.
    ///
    /// Resolves to a cancelled response if the waiter is torn down by
    /// `cancel_pending`.
    pub async fn request_input(&self, kind: K, timeout_ms: Option<u64>) -> UserInputResponse<V> {
        let request = UserInputRequest {
            id: self.ids.generate_id(),
            timeout_ms,
            kind,
        };
        let id = request.id.clone();
        let rx = self.pending.register(&id);

        if self.requests.send(request).is_err() {
            warn!(request_id = %id, "Input requested with no subscribers");
        }

        rx.await
            .unwrap_or_else(|_| UserInputResponse::cancelled(id))
    }

    pub fn provide_input(&self, response: UserInputResponse<V>) -> bool {
        let request_id = response.request_id.clone();
        let resolved = self.pending.resolve(&request_id, response);
        if !resolved {
            warn!(request_id = %request_id, "No pending processor request for response");
        }
        resolved
    }

    /// Unblock every waiting `request_input` with a cancelled response
    pub fn cancel_pending(&self) -> usize {
        self.pending.cancel_all(|id| UserInputResponse::cancelled(id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
