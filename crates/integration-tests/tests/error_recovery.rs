//! Error Recovery Integration Tests
//!
//! Failed items surface as retry/skip prompts; each decision has a distinct
//! effect on the in-memory queue and on the stored status.

mod common;

use std::sync::Arc;

use common::*;
use ticpass_core::domain::{
    AbortCurrentPolicy, ErrorEvent, ErrorHandlingAction, ManagerConfig, ProcessingState,
    QueueInputKind, QueueInputRequest, QueueInputResponse, QueueItemStatus,
};
use ticpass_core::port::QueueStorage;
use ticpass_nfc::processor::NfcEvent;
use ticpass_nfc::storage::balance::BalanceOperation;
use ticpass_nfc::transport::SimulatedTag;
use ticpass_nfc::{NfcOperation, NfcQueueItem, SectorKey};

/// Card formatted with keys the operator does not know
fn foreign_tag() -> Arc<SimulatedTag> {
    Arc::new(SimulatedTag::classic_1k(UID).with_production_keys(
        SectorKey::from_hex("112233445566").unwrap(),
        SectorKey::from_hex("665544332211").unwrap(),
    ))
}

/// Same recovery decision for every failure
fn decide(
    action: ErrorHandlingAction,
) -> impl Fn(&QueueInputRequest) -> QueueInputResponse + Send + Sync + 'static {
    move |request| QueueInputResponse::on_error(&request.id, action)
}

#[tokio::test]
async fn test_absent_tag_then_retry_immediately() {
    let pool = memory_pool().await;
    let storage = storage(&pool);
    let tag = formatted_tag();
    tag.set_present(false);
    let manager = manager(storage.clone(), tag.clone(), ManagerConfig::default());

    // Customer taps the card while the cashier reads the prompt
    let operator = {
        let tag = tag.clone();
        spawn_operator(&manager, move |request| {
            tag.set_present(true);
            QueueInputResponse::on_error_retry(&request.id)
        })
    };

    manager.enqueue(NfcQueueItem::new(NfcOperation::BalanceRead).with_id("read"));
    manager.start_processing();
    finish(&manager).await;

    assert_eq!(
        operator.reported_errors(),
        vec![ErrorEvent::NfcTagReachTimeout]
    );
    manager.flush_storage().await;
    assert_eq!(stored_with(&storage, QueueItemStatus::Completed).await.len(), 1);
}

#[tokio::test]
async fn test_retry_later_moves_item_behind_the_rest() {
    let pool = memory_pool().await;
    let tag = formatted_tag();
    tag.set_present(false);
    let manager = manager(storage(&pool), tag.clone(), ManagerConfig::default());
    let mut events = manager.subscribe_processor_events();

    let operator = {
        let tag = tag.clone();
        spawn_operator(&manager, move |request| {
            tag.set_present(true);
            QueueInputResponse::on_error_skip(&request.id)
        })
    };

    manager.enqueue(NfcQueueItem::new(NfcOperation::BalanceRead).with_priority(1));
    manager.enqueue(NfcQueueItem::new(NfcOperation::CartRead));
    manager.start_processing();
    finish(&manager).await;

    assert_eq!(operator.reported_errors().len(), 1);

    let mut started = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let NfcEvent::Start { operation } = event {
            started.push(operation);
        }
    }
    assert_eq!(started, vec!["BALANCE_READ", "CART_READ", "BALANCE_READ"]);
}

#[tokio::test]
async fn test_abort_current_cancels_in_place() {
    let pool = memory_pool().await;
    let storage = storage(&pool);
    let manager = manager(storage.clone(), foreign_tag(), ManagerConfig::default());
    let operator = spawn_operator(&manager, decide(ErrorHandlingAction::AbortCurrent));

    manager.enqueue(NfcQueueItem::new(NfcOperation::BalanceRead).with_id("read"));
    manager.start_processing();
    finish(&manager).await;

    assert_eq!(
        operator.reported_errors(),
        vec![ErrorEvent::NfcBalanceReadError]
    );

    // Still listed, but never picked up again
    let items = manager.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, QueueItemStatus::Cancelled);
    assert!(matches!(
        *manager.subscribe_state().borrow(),
        ProcessingState::QueueDone
    ));

    manager.flush_storage().await;
    assert_eq!(stored_with(&storage, QueueItemStatus::Cancelled).await.len(), 1);

    // remove gets rid of it for good
    manager.remove(&items[0]).await.unwrap();
    assert!(manager.is_empty());
    assert!(storage.get_all_by_status(&ALL_STATUSES).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_abort_current_remove_policy() {
    let pool = memory_pool().await;
    let storage = storage(&pool);
    let config = ManagerConfig::default().with_abort_current(AbortCurrentPolicy::Remove);
    let manager = manager(storage.clone(), foreign_tag(), config);
    spawn_operator(&manager, decide(ErrorHandlingAction::AbortCurrent));

    manager.enqueue(NfcQueueItem::new(NfcOperation::BalanceUpdate {
        amount: 3_00,
        op: BalanceOperation::Set,
    }));
    manager.start_processing();
    finish(&manager).await;

    assert!(manager.is_empty());
    manager.flush_storage().await;
    assert_eq!(stored_with(&storage, QueueItemStatus::Failed).await.len(), 1);
}

#[tokio::test]
async fn test_abort_all_clears_queue_and_storage() {
    let pool = memory_pool().await;
    let storage = storage(&pool);
    let manager = manager(storage.clone(), foreign_tag(), ManagerConfig::default());
    let operator = spawn_operator(&manager, decide(ErrorHandlingAction::AbortAll));

    manager.enqueue(NfcQueueItem::new(NfcOperation::CartRead).with_priority(2));
    manager.enqueue(NfcQueueItem::new(NfcOperation::BalanceRead).with_priority(1));
    manager.enqueue(NfcQueueItem::new(NfcOperation::CustomerAuth));
    manager.start_processing();
    finish(&manager).await;

    // Only the first failure is ever reported
    assert_eq!(operator.queue_prompts().len(), 1);
    assert!(matches!(
        operator.queue_prompts()[0],
        QueueInputKind::ErrorRetryOrSkip {
            error: ErrorEvent::NfcCartReadError,
            ..
        }
    ));
    assert!(manager.is_empty());
    assert!(matches!(
        *manager.subscribe_state().borrow(),
        ProcessingState::QueueAborted
    ));

    manager.flush_storage().await;
    assert!(storage.get_all_by_status(&ALL_STATUSES).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_abort_while_waiting_for_card() {
    let pool = memory_pool().await;
    let storage = storage(&pool);
    let tag = formatted_tag();
    tag.set_present(false);
    let manager = manager(storage.clone(), tag, ManagerConfig::default());
    let mut events = manager.subscribe_processor_events();
    spawn_operator(&manager, proceed_or_abort);

    manager.enqueue(NfcQueueItem::new(NfcOperation::BalanceRead).with_id("read"));
    manager.start_processing();

    // Wait until the processor is polling for the card
    loop {
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .unwrap()
            .unwrap();
        if matches!(event, NfcEvent::ReachTag { .. }) {
            break;
        }
    }

    assert!(manager.abort().await);
    assert!(!manager.is_processing());
    assert_eq!(manager.items()[0].status, QueueItemStatus::Pending);

    manager.flush_storage().await;
    assert_eq!(stored_with(&storage, QueueItemStatus::Pending).await.len(), 1);
}
