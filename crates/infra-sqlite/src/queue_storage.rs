// SQLite QueueStorage Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::marker::PhantomData;
use std::sync::Arc;
use ticpass_core::domain::{QueueItem, QueueItemStatus};
use ticpass_core::error::Result;
use ticpass_core::port::{QueueStorage, TimeProvider};
use tracing::{debug, warn};

/// Durable queue mirror backed by the `queue_items` table.
///
/// Several queues can share one database; every statement is scoped to
/// `queue`. Items round-trip through their serde JSON form, except for the
/// status, which is read back from its own column.
pub struct SqliteQueueStorage<T> {
    pool: SqlitePool,
    queue: String,
    time_provider: Arc<dyn TimeProvider>,
    _item: PhantomData<fn() -> T>,
}

impl<T> SqliteQueueStorage<T> {
    pub fn new(
        pool: SqlitePool,
        queue: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            queue: queue.into(),
            time_provider,
            _item: PhantomData,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// `?, ?, ?` for an IN clause
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl<T> QueueStorage<T> for SqliteQueueStorage<T>
where
    T: QueueItem + Serialize + DeserializeOwned,
{
    async fn insert(&self, item: &T) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        let now = self.time_provider.now_millis();

        // Replayed inserts keep the original created_at (and rowid), so the
        // restore order stays stable
        sqlx::query(
            r#"
            INSERT INTO queue_items (id, queue, priority, status, payload, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                queue = excluded.queue,
                priority = excluded.priority,
                status = excluded.status,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item.id())
        .bind(&self.queue)
        .bind(item.priority())
        .bind(item.status().as_str())
        .bind(&payload)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, item: &T) -> Result<()> {
        let payload = serde_json::to_string(item)?;

        let result = sqlx::query(
            r#"
            UPDATE queue_items
            SET priority = ?, status = ?, payload = ?, updated_at = ?
            WHERE id = ? AND queue = ?
            "#,
        )
        .bind(item.priority())
        .bind(item.status().as_str())
        .bind(&payload)
        .bind(self.time_provider.now_millis())
        .bind(item.id())
        .bind(&self.queue)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            debug!(item_id = %item.id(), "Update skipped, item not stored");
        }
        Ok(())
    }

    async fn update_status(&self, item: &T, status: QueueItemStatus) -> Result<()> {
        // Optimization: status column only, payload is left as is
        sqlx::query(
            r#"
            UPDATE queue_items
            SET status = ?, updated_at = ?
            WHERE id = ? AND queue = ?
            "#,
        )
        .bind(status.as_str())
        .bind(self.time_provider.now_millis())
        .bind(item.id())
        .bind(&self.queue)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn remove(&self, item: &T) -> Result<()> {
        sqlx::query("DELETE FROM queue_items WHERE id = ? AND queue = ?")
            .bind(item.id())
            .bind(&self.queue)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn remove_by_status(&self, statuses: &[QueueItemStatus]) -> Result<u64> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM queue_items WHERE queue = ? AND status IN ({})",
            placeholders(statuses.len())
        );
        let mut query = sqlx::query(&sql).bind(&self.queue);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn get_all_by_status(&self, statuses: &[QueueItemStatus]) -> Result<Vec<T>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT id, status, payload FROM queue_items
            WHERE queue = ? AND status IN ({})
            ORDER BY priority DESC, created_at ASC, rowid ASC
            "#,
            placeholders(statuses.len())
        );
        let mut query = sqlx::query_as::<_, QueueRow>(&sql).bind(&self.queue);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(rows.into_iter().filter_map(QueueRow::into_item).collect())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    id: String,
    status: String,
    payload: String,
}

impl QueueRow {
    /// Corrupt rows are skipped so one bad payload cannot block a restore
    fn into_item<T: QueueItem + DeserializeOwned>(self) -> Option<T> {
        let Some(status) = QueueItemStatus::parse(&self.status) else {
            warn!(item_id = %self.id, status = %self.status, "Unknown status in storage, row skipped");
            return None;
        };

        match serde_json::from_str::<T>(&self.payload) {
            Ok(mut item) => {
                item.set_status(status);
                Some(item)
            }
            Err(e) => {
                warn!(item_id = %self.id, error = %e, "Undecodable payload in storage, row skipped");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use serde::Deserialize;
    use ticpass_core::domain::Priority;
    use ticpass_core::port::time_provider::mocks::FixedTimeProvider;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sale {
        id: String,
        priority: Priority,
        status: QueueItemStatus,
        amount: u32,
    }

    impl Sale {
        fn new(id: &str, priority: Priority) -> Self {
            Self {
                id: id.to_string(),
                priority,
                status: QueueItemStatus::Pending,
                amount: 100,
            }
        }
    }

    impl QueueItem for Sale {
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

    const ALL: [QueueItemStatus; 5] = [
        QueueItemStatus::Pending,
        QueueItemStatus::Processing,
        QueueItemStatus::Completed,
        QueueItemStatus::Failed,
        QueueItemStatus::Cancelled,
    ];

    async fn setup_test_db() -> (SqlitePool, Arc<FixedTimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, Arc::new(FixedTimeProvider::new(1_000)))
    }

    fn storage(
        pool: &SqlitePool,
        clock: &Arc<FixedTimeProvider>,
        queue: &str,
    ) -> SqliteQueueStorage<Sale> {
        SqliteQueueStorage::new(pool.clone(), queue, clock.clone() as Arc<dyn TimeProvider>)
    }

    fn ids(items: &[Sale]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");

        let sale = Sale::new("s1", 3);
        repo.insert(&sale).await.unwrap();

        let loaded = repo.get_all_by_status(&[QueueItemStatus::Pending]).await.unwrap();
        assert_eq!(loaded, vec![sale]);
    }

    #[tokio::test]
    async fn test_insert_is_upsert_and_keeps_created_at() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");

        let mut sale = Sale::new("s1", 1);
        repo.insert(&sale).await.unwrap();

        clock.advance(500);
        sale.amount = 250;
        repo.insert(&sale).await.unwrap();

        let (created_at, updated_at): (i64, i64) =
            sqlx::query_as("SELECT created_at, updated_at FROM queue_items WHERE id = 's1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(created_at, 1_000);
        assert_eq!(updated_at, 1_500);

        let loaded = repo.get_all_by_status(&ALL).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].amount, 250);
    }

    #[tokio::test]
    async fn test_status_column_is_authoritative() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");

        let sale = Sale::new("s1", 1);
        repo.insert(&sale).await.unwrap();
        repo.update_status(&sale, QueueItemStatus::Processing)
            .await
            .unwrap();

        assert!(repo
            .get_all_by_status(&[QueueItemStatus::Pending])
            .await
            .unwrap()
            .is_empty());

        let loaded = repo
            .get_all_by_status(&[QueueItemStatus::Processing])
            .await
            .unwrap();
        assert_eq!(loaded[0].status, QueueItemStatus::Processing);
    }

    #[tokio::test]
    async fn test_load_orders_by_priority_then_age() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");

        repo.insert(&Sale::new("old-low", 1)).await.unwrap();
        repo.insert(&Sale::new("same-tick-low", 1)).await.unwrap();
        clock.advance(10);
        repo.insert(&Sale::new("high", 9)).await.unwrap();
        repo.insert(&Sale::new("new-low", 1)).await.unwrap();

        let loaded = repo.get_all_by_status(&ALL).await.unwrap();
        assert_eq!(ids(&loaded), vec!["high", "old-low", "same-tick-low", "new-low"]);
    }

    #[tokio::test]
    async fn test_update_replaces_payload_and_ignores_missing() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");

        let mut sale = Sale::new("s1", 1);
        repo.insert(&sale).await.unwrap();

        sale.amount = 999;
        sale.status = QueueItemStatus::Failed;
        repo.update(&sale).await.unwrap();
        repo.update(&Sale::new("ghost", 1)).await.unwrap();

        let loaded = repo.get_all_by_status(&ALL).await.unwrap();
        assert_eq!(loaded, vec![sale]);
    }

    #[tokio::test]
    async fn test_remove_and_remove_by_status() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");

        let done = Sale::new("done", 1);
        let failed = Sale::new("failed", 1);
        let pending = Sale::new("pending", 1);
        for sale in [&done, &failed, &pending] {
            repo.insert(sale).await.unwrap();
        }
        repo.update_status(&done, QueueItemStatus::Completed).await.unwrap();
        repo.update_status(&failed, QueueItemStatus::Failed).await.unwrap();

        let removed = repo
            .remove_by_status(&[QueueItemStatus::Completed, QueueItemStatus::Failed])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.remove_by_status(&[]).await.unwrap(), 0);

        repo.remove(&pending).await.unwrap();
        // Removing twice is fine
        repo.remove(&pending).await.unwrap();
        assert!(repo.get_all_by_status(&ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queues_are_isolated() {
        let (pool, clock) = setup_test_db().await;
        let payments = storage(&pool, &clock, "payments");
        let refunds = storage(&pool, &clock, "refunds");

        payments.insert(&Sale::new("p1", 1)).await.unwrap();
        refunds.insert(&Sale::new("r1", 1)).await.unwrap();

        assert_eq!(
            payments
                .remove_by_status(&[QueueItemStatus::Pending])
                .await
                .unwrap(),
            1
        );
        assert_eq!(ids(&refunds.get_all_by_status(&ALL).await.unwrap()), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped() {
        let (pool, clock) = setup_test_db().await;
        let repo = storage(&pool, &clock, "payments");
        repo.insert(&Sale::new("good", 1)).await.unwrap();

        sqlx::query(
            "INSERT INTO queue_items (id, queue, priority, status, payload, created_at, updated_at) \
             VALUES ('bad-json', 'payments', 5, 'PENDING', '{not json', 0, 0), \
                    ('bad-status', 'payments', 5, 'DONE', '{}', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let loaded = repo
            .get_all_by_status(&[QueueItemStatus::Pending])
            .await
            .unwrap();
        assert_eq!(ids(&loaded), vec!["good"]);
    }
}
