// Queue Item Domain Model

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Queue item ID (UUID v4 by default)
pub type ItemId = String;

/// Priority (higher number = higher priority)
pub type Priority = i32;

/// Lifecycle status of a queued unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl QueueItemStatus {
    /// Statuses the processing loop may still pick up
    pub fn is_runnable(self) -> bool {
        matches!(self, QueueItemStatus::Pending | QueueItemStatus::Processing)
    }

    /// Statuses swept by `clear_completed`
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueItemStatus::Completed | QueueItemStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "PENDING",
            QueueItemStatus::Processing => "PROCESSING",
            QueueItemStatus::Completed => "COMPLETED",
            QueueItemStatus::Failed => "FAILED",
            QueueItemStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse the persisted representation (see `as_str`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(QueueItemStatus::Pending),
            "PROCESSING" => Some(QueueItemStatus::Processing),
            "COMPLETED" => Some(QueueItemStatus::Completed),
            "FAILED" => Some(QueueItemStatus::Failed),
            "CANCELLED" => Some(QueueItemStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared capability surface of every queued unit of work.
///
/// The manager only ever looks at these three fields; payload lives in the
/// concrete variant and is interpreted by the matching processor.
pub trait QueueItem: Clone + Debug + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn priority(&self) -> Priority;
    fn status(&self) -> QueueItemStatus;
    fn set_status(&mut self, status: QueueItemStatus);
}

/// Stable sort by descending priority (ties keep insertion order)
pub fn sort_by_priority<T: QueueItem>(items: &mut [T]) {
    items.sort_by_key(|item| std::cmp::Reverse(item.priority()));
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TestItem {
        pub id: String,
        pub priority: Priority,
        pub status: QueueItemStatus,
        pub label: String,
    }

    impl TestItem {
        pub fn new(id: &str, priority: Priority) -> Self {
            Self {
                id: id.to_string(),
                priority,
                status: QueueItemStatus::Pending,
                label: String::new(),
            }
        }
    }

    impl QueueItem for TestItem {
        fn id(&self) -> &str {
            &self.id
        }
        fn priority(&self) -> Priority {
            self.priority
        }
        fn status(&self) -> QueueItemStatus {
            self.status
        }
        fn set_status(&mut self, status: QueueItemStatus) {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::TestItem;
    use super::*;

    #[test]
    fn test_status_roundtrip_through_persisted_form() {
        for status in [
            QueueItemStatus::Pending,
            QueueItemStatus::Processing,
            QueueItemStatus::Completed,
            QueueItemStatus::Failed,
            QueueItemStatus::Cancelled,
        ] {
            assert_eq!(QueueItemStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(QueueItemStatus::parse("DONE"), None);
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        let json = serde_json::to_string(&QueueItemStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let mut items = vec![
            TestItem::new("a", 1),
            TestItem::new("b", 5),
            TestItem::new("c", 1),
            TestItem::new("d", 5),
        ];
        sort_by_priority(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }
}
