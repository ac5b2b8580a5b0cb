// Queue Processor Port (Interface)

use crate::domain::{ProcessingResult, QueueItem, UserInputRequest, UserInputResponse};
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::broadcast;

/// Executes one family of queue items against external hardware/services.
///
/// Implementations:
/// - NfcProcessor (ticpass-nfc): tag format, customer, cart and balance operations
/// - MockProcessor: scripted outcomes for engine tests
#[async_trait]
pub trait QueueProcessor: Send + Sync + 'static {
    type Item: QueueItem;
    /// Opaque success payload, handed back through `ProcessingState::ItemDone`
    type Output: Clone + Debug + Send + Sync + 'static;
    /// Progress events
    type Event: Clone + Debug + Send + 'static;
    /// Processor-level input request kind (PIN entry, key selection, ...)
    type InputKind: Clone + Debug + Send + 'static;
    type InputValue: Debug + Send + 'static;

    fn subscribe_events(&self) -> broadcast::Receiver<Self::Event>;

    fn subscribe_input_requests(&self) -> broadcast::Receiver<UserInputRequest<Self::InputKind>>;

    /// Run one attempt. Every internal fault must come back as
    /// `ProcessingResult::Error`.
    async fn process(&self, item: &Self::Item) -> ProcessingResult<Self::Output>;

    /// Resolve a processor-level suspension; false if no request matched
    fn provide_input(&self, response: UserInputResponse<Self::InputValue>) -> bool;

    /// Best-effort cancellation of in-flight work (`None` = whatever is active).
    /// Safe to call when idle, idempotent.
    async fn abort(&self, item: Option<&Self::Item>) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::application::suspension::ProcessorChannels;
    use crate::domain::ErrorEvent;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use std::collections::{HashMap, VecDeque};
    use std::marker::PhantomData;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Scripted outcome of one `process()` call
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        /// Succeed with the given payload
        Succeed(String),
        Fail(ErrorEvent),
        /// Panic inside `process()`
        Panic(String),
        /// Sleep, then succeed with the item id
        Delay(Duration),
        /// Ask for input, succeed with the answer (fail with CancelledByUser)
        AskInput(String),
        /// Block until `abort()`, then fail with OperationAborted
        BlockUntilAborted,
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Mock processor driven by per-item scripts.
    ///
    /// Items without a script (or with an exhausted one) succeed with their id.
    pub struct MockProcessor<T> {
        scripts: Mutex<HashMap<String, VecDeque<MockOutcome>>>,
        calls: Mutex<Vec<String>>,
        aborts: Mutex<Vec<Option<String>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        abort_signal: Notify,
        channels: ProcessorChannels<String, String, String>,
        _item: PhantomData<fn() -> T>,
    }

    impl<T: QueueItem> Default for MockProcessor<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: QueueItem> MockProcessor<T> {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                aborts: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                abort_signal: Notify::new(),
                channels: ProcessorChannels::new(Arc::new(SequentialIdProvider::new("mock-input"))),
                _item: PhantomData,
            }
        }

        /// Queue outcomes for successive `process()` calls on `item_id`
        pub fn script(&self, item_id: &str, outcomes: impl IntoIterator<Item = MockOutcome>) {
            self.scripts
                .lock()
                .unwrap()
                .entry(item_id.to_string())
                .or_default()
                .extend(outcomes);
        }

        /// Item ids in the order they were processed
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn aborts(&self) -> Vec<Option<String>> {
            self.aborts.lock().unwrap().clone()
        }

        /// Highest number of concurrent `process()` calls observed
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn next_outcome(&self, item_id: &str) -> MockOutcome {
            self.scripts
                .lock()
                .unwrap()
                .get_mut(item_id)
                .and_then(|s| s.pop_front())
                .unwrap_or_else(|| MockOutcome::Succeed(item_id.to_string()))
        }
    }

    #[async_trait]
    impl<T: QueueItem> QueueProcessor for MockProcessor<T> {
        type Item = T;
        type Output = String;
        type Event = String;
        type InputKind = String;
        type InputValue = String;

        fn subscribe_events(&self) -> broadcast::Receiver<String> {
            self.channels.subscribe_events()
        }

        fn subscribe_input_requests(&self) -> broadcast::Receiver<UserInputRequest<String>> {
            self.channels.subscribe_requests()
        }

        async fn process(&self, item: &T) -> ProcessingResult<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _in_flight = InFlight(&self.in_flight);

            // Armed before the start event so an abort racing the event is not lost
            let aborted = self.abort_signal.notified();
            tokio::pin!(aborted);
            aborted.as_mut().enable();

            self.calls.lock().unwrap().push(item.id().to_string());
            self.channels.emit(format!("start:{}", item.id()));

            match self.next_outcome(item.id()) {
                MockOutcome::Succeed(payload) => ProcessingResult::Success(payload),
                MockOutcome::Fail(event) => ProcessingResult::Error(event),
                MockOutcome::Panic(msg) => panic!("{}", msg),
                MockOutcome::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    ProcessingResult::Success(item.id().to_string())
                }
                MockOutcome::AskInput(kind) => {
                    match self.channels.request_input(kind, None).await.into_value() {
                        Some(answer) => ProcessingResult::Success(answer),
                        None => ProcessingResult::Error(ErrorEvent::CancelledByUser),
                    }
                }
                MockOutcome::BlockUntilAborted => {
                    aborted.await;
                    ProcessingResult::Error(ErrorEvent::OperationAborted)
                }
            }
        }

        fn provide_input(&self, response: UserInputResponse<String>) -> bool {
            self.channels.provide_input(response)
        }

        async fn abort(&self, item: Option<&T>) -> bool {
            self.aborts
                .lock()
                .unwrap()
                .push(item.map(|i| i.id().to_string()));
            self.channels.cancel_pending();
            self.abort_signal.notify_waiters();
            true
        }
    }
}
