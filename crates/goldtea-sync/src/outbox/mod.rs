//! # Outbox
//!
//! Background writes that failed are queued here and replayed later.
//!
//! ```text
//!   SyncCoordinator ──(write failed)──► OutboxStore::enqueue
//!                                            │
//!                    ┌───────────────────────┘
//!                    ▼
//!   OutboxProcessor (poll) ──► pending(batch) ──► apply_write
//!                                                   ├── ok  → mark_synced
//!                                                   └── err → mark_failed
//!
//!   SyncCoordinator ──(later write succeeded)──► supersede(entity, through)
//! ```
//!
//! At most one unsynced entry exists per entity: queuing a write drops any
//! older one for the same entity, and an older write is never queued over
//! a newer one. Replaying an old write after a newer one reached the store
//! would otherwise undo the newer one.
//!
//! Two stores are provided: [`MemoryOutbox`], lost on restart, and
//! [`SqliteOutbox`], which survives it.

mod processor;
mod sqlite;

pub use processor::{BatchReport, OutboxProcessor, OutboxProcessorHandle};
pub use sqlite::SqliteOutbox;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use goldtea_core::Collection;

use crate::coordinator::WriteOp;
use crate::error::SyncResult;

/// One queued write awaiting replay.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub id: String,
    pub op: WriteOp,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// Storage for queued writes.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Queues `op`. Returns `false` when a newer write for the same entity
    /// is already queued and this one was dropped.
    async fn enqueue(&self, op: &WriteOp, requested_at: DateTime<Utc>) -> SyncResult<bool>;

    /// Unsynced entries with fewer than `max_attempts` attempts, oldest
    /// request first.
    async fn pending(&self, limit: usize, max_attempts: u32) -> SyncResult<Vec<PendingWrite>>;

    async fn mark_synced(&self, id: &str) -> SyncResult<()>;

    async fn mark_failed(&self, id: &str, error: &str) -> SyncResult<()>;

    /// Drops unsynced entries for the entity requested at or before
    /// `through`. Returns how many were dropped.
    async fn supersede(
        &self,
        collection: Collection,
        entity_id: &str,
        through: DateTime<Utc>,
    ) -> SyncResult<u64>;

    /// Unsynced entries, including ones out of attempts.
    async fn count_pending(&self) -> SyncResult<u64>;
}

// =============================================================================
// In-Memory Outbox
// =============================================================================

/// Process-local outbox.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    entries: Mutex<Vec<PendingWrite>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingWrite>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn same_entity(entry: &PendingWrite, collection: Collection, entity_id: &str) -> bool {
    entry.op.collection() == collection && entry.op.id() == entity_id
}

#[async_trait]
impl OutboxStore for MemoryOutbox {
    async fn enqueue(&self, op: &WriteOp, requested_at: DateTime<Utc>) -> SyncResult<bool> {
        let mut entries = self.lock();
        let (collection, entity_id) = (op.collection(), op.id());

        if entries
            .iter()
            .any(|e| same_entity(e, collection, entity_id) && e.requested_at > requested_at)
        {
            return Ok(false);
        }

        entries.retain(|e| !same_entity(e, collection, entity_id));
        entries.push(PendingWrite {
            id: Uuid::new_v4().to_string(),
            op: op.clone(),
            attempts: 0,
            last_error: None,
            requested_at,
        });
        Ok(true)
    }

    async fn pending(&self, limit: usize, max_attempts: u32) -> SyncResult<Vec<PendingWrite>> {
        let mut due: Vec<PendingWrite> = self
            .lock()
            .iter()
            .filter(|e| e.attempts < max_attempts)
            .cloned()
            .collect();
        due.sort_by_key(|e| e.requested_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_synced(&self, id: &str) -> SyncResult<()> {
        self.lock().retain(|e| e.id != id);
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str) -> SyncResult<()> {
        if let Some(entry) = self.lock().iter_mut().find(|e| e.id == id) {
            entry.attempts = entry.attempts.saturating_add(1);
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn supersede(
        &self,
        collection: Collection,
        entity_id: &str,
        through: DateTime<Utc>,
    ) -> SyncResult<u64> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| !(same_entity(e, collection, entity_id) && e.requested_at <= through));
        Ok((before - entries.len()) as u64)
    }

    async fn count_pending(&self) -> SyncResult<u64> {
        Ok(self.lock().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn delete(collection: Collection, id: &str) -> WriteOp {
        WriteOp::Delete {
            collection,
            id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_entry_per_entity() {
        let outbox = MemoryOutbox::new();
        let t0 = Utc::now();

        assert!(outbox.enqueue(&delete(Collection::Notes, "n1"), t0).await.unwrap());
        assert!(outbox
            .enqueue(&delete(Collection::Notes, "n1"), t0 + Duration::seconds(1))
            .await
            .unwrap());
        assert_eq!(outbox.count_pending().await.unwrap(), 1);

        // Older than what is queued: dropped
        assert!(!outbox
            .enqueue(&delete(Collection::Notes, "n1"), t0 - Duration::seconds(1))
            .await
            .unwrap());

        // Same id in another collection is a different entity
        assert!(outbox.enqueue(&delete(Collection::Sales, "n1"), t0).await.unwrap());
        assert_eq!(outbox.count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pending_respects_attempts_and_order() {
        let outbox = MemoryOutbox::new();
        let t0 = Utc::now();
        outbox.enqueue(&delete(Collection::Sales, "b"), t0 + Duration::seconds(5)).await.unwrap();
        outbox.enqueue(&delete(Collection::Sales, "a"), t0).await.unwrap();

        let pending = outbox.pending(10, 3).await.unwrap();
        assert_eq!(pending.iter().map(|p| p.op.id()).collect::<Vec<_>>(), vec!["a", "b"]);

        for _ in 0..3 {
            outbox.mark_failed(&pending[0].id, "offline").await.unwrap();
        }
        let pending = outbox.pending(10, 3).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op.id(), "b");
        assert_eq!(outbox.count_pending().await.unwrap(), 2);

        outbox.mark_synced(&pending[0].id).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_supersede_only_drops_older_entries() {
        let outbox = MemoryOutbox::new();
        let t0 = Utc::now();
        outbox.enqueue(&delete(Collection::Villages, "Rampur"), t0).await.unwrap();

        let dropped = outbox
            .supersede(Collection::Villages, "Rampur", t0 - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(dropped, 0);

        let dropped = outbox.supersede(Collection::Villages, "Rampur", t0).await.unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
    }
}
