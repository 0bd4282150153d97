//! Durable outbox over `goldtea_db::PendingWriteRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use goldtea_core::Collection;
use goldtea_db::{Database, PendingWriteEntry, PendingWriteRepository};

use super::{OutboxStore, PendingWrite};
use crate::coordinator::WriteOp;
use crate::error::SyncResult;

/// Outbox that survives restarts.
#[derive(Debug, Clone)]
pub struct SqliteOutbox {
    repo: PendingWriteRepository,
}

impl SqliteOutbox {
    pub fn new(db: &Database) -> Self {
        SqliteOutbox {
            repo: db.pending_writes(),
        }
    }

    /// Removes synced history older than `days` days.
    pub async fn cleanup(&self, days: u32) -> SyncResult<u64> {
        let removed = self.repo.cleanup_old_entries(days).await?;
        if removed > 0 {
            info!(removed, days, "Cleaned up synced outbox entries");
        }
        Ok(removed)
    }

    fn decode(entry: &PendingWriteEntry) -> SyncResult<PendingWrite> {
        let op: WriteOp = serde_json::from_str(&entry.operation)?;
        Ok(PendingWrite {
            id: entry.id.clone(),
            op,
            attempts: u32::try_from(entry.attempts).unwrap_or(u32::MAX),
            last_error: entry.last_error.clone(),
            requested_at: entry.requested_at,
        })
    }
}

#[async_trait]
impl OutboxStore for SqliteOutbox {
    async fn enqueue(&self, op: &WriteOp, requested_at: DateTime<Utc>) -> SyncResult<bool> {
        let operation = serde_json::to_string(op)?;
        let queued = self
            .repo
            .enqueue(op.collection().as_str(), op.id(), &operation, requested_at)
            .await?;
        Ok(queued.is_some())
    }

    async fn pending(&self, limit: usize, max_attempts: u32) -> SyncResult<Vec<PendingWrite>> {
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        let entries = self.repo.get_pending(limit, max_attempts).await?;

        let mut pending = Vec::with_capacity(entries.len());
        for entry in &entries {
            match Self::decode(entry) {
                Ok(write) => pending.push(write),
                Err(e) => {
                    warn!(id = %entry.id, collection = %entry.collection, error = %e, "Undecodable outbox entry");
                    self.repo.mark_failed(&entry.id, &e.to_string()).await?;
                }
            }
        }
        Ok(pending)
    }

    async fn mark_synced(&self, id: &str) -> SyncResult<()> {
        Ok(self.repo.mark_synced(id).await?)
    }

    async fn mark_failed(&self, id: &str, error: &str) -> SyncResult<()> {
        Ok(self.repo.mark_failed(id, error).await?)
    }

    async fn supersede(
        &self,
        collection: Collection,
        entity_id: &str,
        through: DateTime<Utc>,
    ) -> SyncResult<u64> {
        Ok(self
            .repo
            .supersede(collection.as_str(), entity_id, through)
            .await?)
    }

    async fn count_pending(&self) -> SyncResult<u64> {
        let count = self.repo.count_pending().await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldtea_db::DbConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_entries_round_trip_through_sqlite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = SqliteOutbox::new(&db);
        let op = WriteOp::Upsert {
            collection: Collection::Villages,
            id: "Rampur".into(),
            data: json!({ "name": "Rampur", "day": "Monday" }),
            reconcile: None,
        };

        assert!(outbox.enqueue(&op, Utc::now()).await.unwrap());
        let pending = outbox.pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op, op);
        assert_eq!(pending[0].attempts, 0);

        outbox.mark_failed(&pending[0].id, "offline").await.unwrap();
        let pending = outbox.pending(10, 5).await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("offline"));

        outbox.mark_synced(&pending[0].id).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_garbage_entry_is_skipped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.pending_writes()
            .enqueue("notes", "n1", "not json", Utc::now())
            .await
            .unwrap();

        let outbox = SqliteOutbox::new(&db);
        assert!(outbox.pending(10, 5).await.unwrap().is_empty());
        assert_eq!(outbox.count_pending().await.unwrap(), 1);
    }
}
