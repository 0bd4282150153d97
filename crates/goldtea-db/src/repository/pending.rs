//! # Pending Write Repository
//!
//! Durable queue of background writes that did not reach the document store.
//!
//! ## Lifecycle of an Entry
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Background write fails                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(collection, entity_id, operation, requested_at)               │
//! │       │  • older unsynced entries for the same entity are dropped      │
//! │       │  • skipped entirely if a newer request is already queued       │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            OUTBOX PROCESSOR (goldtea-sync, every poll)          │   │
//! │  │                                                                 │   │
//! │  │  get_pending(batch, max_attempts)  oldest request first        │   │
//! │  │     ├── replay ok   → mark_synced(id)                          │   │
//! │  │     └── replay err  → mark_failed(id, error)  attempts += 1    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cleanup_old_entries(days)  removes synced history                     │
//! │                                                                         │
//! │  A later direct write that succeeds calls supersede(), which drops     │
//! │  every unsynced entry for that entity requested no later than it.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{from_millis, to_millis};
use crate::error::DbResult;

/// One queued write.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWriteEntry {
    pub id: String,
    pub collection: String,
    pub entity_id: String,
    /// Serialized write operation (JSON).
    pub operation: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl PendingWriteEntry {
    fn from_row(row: &SqliteRow) -> DbResult<Self> {
        Ok(PendingWriteEntry {
            id: row.try_get("id")?,
            collection: row.try_get("collection")?,
            entity_id: row.try_get("entity_id")?,
            operation: row.try_get("operation")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
            requested_at: from_millis(row.try_get("requested_at")?),
            attempted_at: row
                .try_get::<Option<i64>, _>("attempted_at")?
                .map(from_millis),
            synced_at: row.try_get::<Option<i64>, _>("synced_at")?.map(from_millis),
        })
    }
}

/// Repository for pending-write operations.
#[derive(Debug, Clone)]
pub struct PendingWriteRepository {
    pool: SqlitePool,
}

impl PendingWriteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PendingWriteRepository { pool }
    }

    /// Queues a write for retry.
    ///
    /// Returns `None` when a newer request for the same entity is already
    /// queued, in which case this one is obsolete and nothing is stored.
    pub async fn enqueue(
        &self,
        collection: &str,
        entity_id: &str,
        operation: &str,
        requested_at: DateTime<Utc>,
    ) -> DbResult<Option<PendingWriteEntry>> {
        let requested_ms = to_millis(requested_at);
        let mut tx = self.pool.begin().await?;

        let newer: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM pending_writes
            WHERE collection = ?1 AND entity_id = ?2
              AND synced_at IS NULL AND requested_at > ?3
            "#,
        )
        .bind(collection)
        .bind(entity_id)
        .bind(requested_ms)
        .fetch_one(&mut *tx)
        .await?;

        if newer > 0 {
            debug!(
                collection = %collection,
                entity_id = %entity_id,
                "Newer write already queued; dropping obsolete one"
            );
            tx.commit().await?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            DELETE FROM pending_writes
            WHERE collection = ?1 AND entity_id = ?2
              AND synced_at IS NULL AND requested_at <= ?3
            "#,
        )
        .bind(collection)
        .bind(entity_id)
        .bind(requested_ms)
        .execute(&mut *tx)
        .await?;

        let entry = PendingWriteEntry {
            id: Uuid::new_v4().to_string(),
            collection: collection.to_string(),
            entity_id: entity_id.to_string(),
            operation: operation.to_string(),
            attempts: 0,
            last_error: None,
            requested_at: from_millis(requested_ms),
            attempted_at: None,
            synced_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO pending_writes (
                id, collection, entity_id, operation,
                attempts, last_error, requested_at, attempted_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, NULL, NULL)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.collection)
        .bind(&entry.entity_id)
        .bind(&entry.operation)
        .bind(requested_ms)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            collection = %collection,
            entity_id = %entity_id,
            "Queued pending write"
        );
        Ok(Some(entry))
    }

    /// Unsynced entries still under `max_attempts`, oldest request first.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<PendingWriteEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, collection, entity_id, operation, attempts, last_error,
                   requested_at, attempted_at, synced_at
            FROM pending_writes
            WHERE synced_at IS NULL AND attempts < ?1
            ORDER BY requested_at ASC, rowid ASC
            LIMIT ?2
            "#,
        )
        .bind(i64::from(max_attempts))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(PendingWriteEntry::from_row).collect()
    }

    pub async fn mark_synced(&self, id: &str) -> DbResult<()> {
        let now = to_millis(Utc::now());

        sqlx::query("UPDATE pending_writes SET synced_at = ?2, attempted_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = to_millis(Utc::now());

        sqlx::query(
            r#"
            UPDATE pending_writes SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Drops unsynced entries for an entity requested at or before `through`.
    ///
    /// Called after a direct write for that entity succeeded.
    pub async fn supersede(
        &self,
        collection: &str,
        entity_id: &str,
        through: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM pending_writes
            WHERE collection = ?1 AND entity_id = ?2
              AND synced_at IS NULL AND requested_at <= ?3
            "#,
        )
        .bind(collection)
        .bind(entity_id)
        .bind(to_millis(through))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counts unsynced entries, including ones that ran out of attempts.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_writes WHERE synced_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes synced entries older than `days_old` days.
    pub async fn cleanup_old_entries(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            "DELETE FROM pending_writes WHERE synced_at IS NOT NULL AND synced_at < ?1",
        )
        .bind(to_millis(cutoff))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn repo() -> (Database, PendingWriteRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.pending_writes();
        (db, repo)
    }

    fn at(ms: i64) -> DateTime<Utc> {
        from_millis(1_700_000_000_000 + ms)
    }

    #[tokio::test]
    async fn test_enqueue_and_get_pending_in_order() {
        let (_db, repo) = repo().await;
        repo.enqueue("notes", "n2", "{}", at(20)).await.unwrap();
        repo.enqueue("notes", "n1", "{}", at(10)).await.unwrap();

        let pending = repo.get_pending(10, 10).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert_eq!(repo.count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_newer_write_supersedes_older() {
        let (_db, repo) = repo().await;
        repo.enqueue("pricing", "Mix_100gm", "old", at(10)).await.unwrap();
        repo.enqueue("pricing", "Mix_100gm", "new", at(20)).await.unwrap();

        let pending = repo.get_pending(10, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, "new");

        // An older request arriving late is dropped
        let stored = repo.enqueue("pricing", "Mix_100gm", "stale", at(5)).await.unwrap();
        assert!(stored.is_none());
        assert_eq!(repo.get_pending(10, 10).await.unwrap()[0].operation, "new");
    }

    #[tokio::test]
    async fn test_mark_failed_and_attempt_cap() {
        let (_db, repo) = repo().await;
        let entry = repo.enqueue("sales", "s1", "{}", at(0)).await.unwrap().unwrap();

        repo.mark_failed(&entry.id, "offline").await.unwrap();
        repo.mark_failed(&entry.id, "still offline").await.unwrap();

        let pending = repo.get_pending(10, 10).await.unwrap();
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("still offline"));
        assert!(pending[0].attempted_at.is_some());

        // Exhausted entries are no longer handed out but still counted
        assert!(repo.get_pending(10, 2).await.unwrap().is_empty());
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_synced_and_cleanup() {
        let (_db, repo) = repo().await;
        let entry = repo.enqueue("sales", "s1", "{}", at(0)).await.unwrap().unwrap();
        repo.mark_synced(&entry.id).await.unwrap();

        assert_eq!(repo.count_pending().await.unwrap(), 0);
        // Synced just now, so nothing is old enough yet
        assert_eq!(repo.cleanup_old_entries(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_supersede_only_touches_older_requests() {
        let (_db, repo) = repo().await;
        repo.enqueue("villages", "Rampur", "{}", at(50)).await.unwrap();

        assert_eq!(repo.supersede("villages", "Rampur", at(40)).await.unwrap(), 0);
        assert_eq!(repo.supersede("villages", "Rampur", at(50)).await.unwrap(), 1);
        assert_eq!(repo.count_pending().await.unwrap(), 0);
    }
}
