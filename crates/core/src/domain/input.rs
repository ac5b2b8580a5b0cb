// Human-in-the-loop Input Requests
//
// Queue-level requests are owned by the manager; processor-level requests are
// generic over the processor's own request kind and value types.

use super::{ErrorEvent, ItemId};
use serde::{Deserialize, Serialize};

/// Unique id correlating a request with its response
pub type RequestId = String;

/// Recovery decision for a failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorHandlingAction {
    /// Re-run the same item in the same position
    RetryImmediately,
    /// Move the item to the tail and continue ("skip")
    RetryLater,
    /// Abort the item, keep going with the rest
    AbortCurrent,
    /// Abort everything and clear the queue
    AbortAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueInputKind {
    ConfirmNextProcessor {
        current_index: usize,
        total: usize,
        current_id: ItemId,
        next_id: Option<ItemId>,
    },
    ErrorRetryOrSkip {
        item_id: ItemId,
        error: ErrorEvent,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInputRequest {
    pub id: RequestId,
    /// Advisory only; the UI layer enforces it
    pub timeout_ms: Option<u64>,
    pub kind: QueueInputKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueInputValue {
    Confirm(bool),
    Action(ErrorHandlingAction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInputResponse {
    pub request_id: RequestId,
    pub value: Option<QueueInputValue>,
    pub is_cancelled: bool,
}

impl QueueInputResponse {
    fn with_value(request_id: impl Into<String>, value: QueueInputValue) -> Self {
        Self {
            request_id: request_id.into(),
            value: Some(value),
            is_cancelled: false,
        }
    }

    pub fn cancelled(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            value: None,
            is_cancelled: true,
        }
    }

    pub fn proceed(request_id: impl Into<String>) -> Self {
        Self::with_value(request_id, QueueInputValue::Confirm(true))
    }

    pub fn skip(request_id: impl Into<String>) -> Self {
        Self::with_value(request_id, QueueInputValue::Confirm(false))
    }

    pub fn on_error(request_id: impl Into<String>, action: ErrorHandlingAction) -> Self {
        Self::with_value(request_id, QueueInputValue::Action(action))
    }

    pub fn on_error_retry(request_id: impl Into<String>) -> Self {
        Self::on_error(request_id, ErrorHandlingAction::RetryImmediately)
    }

    pub fn on_error_skip(request_id: impl Into<String>) -> Self {
        Self::on_error(request_id, ErrorHandlingAction::RetryLater)
    }

    pub fn on_error_abort(request_id: impl Into<String>) -> Self {
        Self::on_error(request_id, ErrorHandlingAction::AbortCurrent)
    }

    pub fn on_error_abort_all(request_id: impl Into<String>) -> Self {
        Self::on_error(request_id, ErrorHandlingAction::AbortAll)
    }

    /// True only for an explicit, non-cancelled "proceed"
    pub fn is_confirmed(&self) -> bool {
        !self.is_cancelled && matches!(self.value, Some(QueueInputValue::Confirm(true)))
    }

    /// Action carried by an error response; cancelled or untyped responses
    /// resolve to `RetryLater`
    pub fn error_action(&self) -> ErrorHandlingAction {
        match (self.is_cancelled, self.value) {
            (false, Some(QueueInputValue::Action(action))) => action,
            _ => ErrorHandlingAction::RetryLater,
        }
    }
}

/// Processor-level input request (PIN entry, key selection, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputRequest<K> {
    pub id: RequestId,
    pub timeout_ms: Option<u64>,
    pub kind: K,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputResponse<V> {
    pub request_id: RequestId,
    pub value: Option<V>,
    pub is_cancelled: bool,
}

impl<V> UserInputResponse<V> {
    pub fn new(request_id: impl Into<String>, value: V) -> Self {
        Self {
            request_id: request_id.into(),
            value: Some(value),
            is_cancelled: false,
        }
    }

    pub fn cancelled(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            value: None,
            is_cancelled: true,
        }
    }

    /// Value unless the response was cancelled
    pub fn into_value(self) -> Option<V> {
        if self.is_cancelled {
            None
        } else {
            self.value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_responses() {
        assert!(QueueInputResponse::proceed("r1").is_confirmed());
        assert!(!QueueInputResponse::skip("r1").is_confirmed());
        assert!(!QueueInputResponse::cancelled("r1").is_confirmed());
    }

    #[test]
    fn test_error_action_defaults_to_skip() {
        assert_eq!(
            QueueInputResponse::on_error_abort_all("r").error_action(),
            ErrorHandlingAction::AbortAll
        );
        assert_eq!(
            QueueInputResponse::cancelled("r").error_action(),
            ErrorHandlingAction::RetryLater
        );
        assert_eq!(
            QueueInputResponse::proceed("r").error_action(),
            ErrorHandlingAction::RetryLater
        );
    }

    #[test]
    fn test_user_input_cancelled_drops_value() {
        let mut response = UserInputResponse::new("r", 42u32);
        assert_eq!(response.clone().into_value(), Some(42));
        response.is_cancelled = true;
        assert_eq!(response.into_value(), None);
    }
}
