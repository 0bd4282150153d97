//! # Sync Coordinator
//!
//! Optimistic, local-first writes.
//!
//! ## Write Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DataService::add_village(..)                                          │
//! │       │  1. validate                                                    │
//! │       │  2. invalidate caches of that kind (synchronous)               │
//! │       ▼                                                                 │
//! │  SyncCoordinator::submit(WriteOp) ──► WriteTicket  (OptimisticAck)     │
//! │       │                                   returned before any I/O      │
//! │       ▼  spawned task                                                   │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  store.upsert / store.delete                                   │   │
//! │  │     ├── ok  ──► reconcile legacy duplicates (canonical upserts) │   │
//! │  │     │           drop older queued retries for the entity        │   │
//! │  │     │           ──► BackgroundSynced                            │   │
//! │  │     └── err ──► queue in outbox for retry                       │   │
//! │  │                 ──► BackgroundFailed(reason)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  No rollback ever happens and the caller never sees the background     │
//! │  error unless it chooses to await the ticket.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reconciliation
//! After a canonical upsert succeeds, every document matching the record's
//! logical filters but stored under a different id is deleted. The pass is
//! idempotent and best effort: failures are logged and the next write to
//! the same entity tries again.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use goldtea_core::{Collection, DocumentQuery, Filter};

use crate::error::SyncResult;
use crate::outbox::OutboxStore;
use crate::store::RemoteStore;

// =============================================================================
// Write Operations
// =============================================================================

/// Filters selecting documents that share a record's logical key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconcile {
    pub filters: Vec<Filter>,
}

/// One write against the store, serializable so it can be queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    Upsert {
        collection: Collection,
        id: String,
        data: Value,
        /// Present for records written under a canonical id.
        reconcile: Option<Reconcile>,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> Collection {
        match self {
            WriteOp::Upsert { collection, .. } | WriteOp::Delete { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Upsert { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Upsert { .. } => "upsert",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// Applies a write to the store, reconciling duplicates after a canonical
/// upsert. Shared by the direct path and outbox replay.
pub async fn apply_write(store: &dyn RemoteStore, op: &WriteOp) -> SyncResult<()> {
    match op {
        WriteOp::Upsert {
            collection,
            id,
            data,
            reconcile,
        } => {
            store.upsert(*collection, id, data).await?;
            if let Some(plan) = reconcile {
                reconcile_duplicates(store, *collection, id, &plan.filters).await;
            }
            Ok(())
        }
        WriteOp::Delete { collection, id } => store.delete(*collection, id).await,
    }
}

/// Deletes every document matching `filters` whose id is not `canonical_id`.
///
/// Returns how many were removed. Never fails.
pub async fn reconcile_duplicates(
    store: &dyn RemoteStore,
    collection: Collection,
    canonical_id: &str,
    filters: &[Filter],
) -> usize {
    let query = DocumentQuery::new().filters(filters.iter().cloned());
    let docs = match store.query(collection, &query).await {
        Ok(docs) => docs,
        Err(e) => {
            warn!(collection = %collection, id = %canonical_id, error = %e, "Reconciliation query failed");
            return 0;
        }
    };

    let legacy: Vec<String> = docs
        .into_iter()
        .map(|doc| doc.id)
        .filter(|id| id != canonical_id)
        .collect();
    if legacy.is_empty() {
        return 0;
    }

    let results = join_all(legacy.iter().map(|id| store.delete(collection, id))).await;

    let mut removed = 0;
    for (id, result) in legacy.iter().zip(results) {
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(collection = %collection, id = %id, error = %e, "Failed to delete legacy duplicate"),
        }
    }

    info!(collection = %collection, id = %canonical_id, removed, "Reconciled legacy duplicates");
    removed
}

// =============================================================================
// Write Tracking
// =============================================================================

/// Progress of one write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteState {
    Requested,
    OptimisticAck,
    BackgroundSynced,
    BackgroundFailed(String),
}

impl WriteState {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            WriteState::BackgroundSynced | WriteState::BackgroundFailed(_)
        )
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteState::Requested => write!(f, "requested"),
            WriteState::OptimisticAck => write!(f, "acknowledged"),
            WriteState::BackgroundSynced => write!(f, "synced"),
            WriteState::BackgroundFailed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Observes one write. Dropping it does not affect the write.
#[derive(Debug, Clone)]
pub struct WriteTicket {
    collection: Collection,
    id: String,
    rx: watch::Receiver<WriteState>,
}

impl WriteTicket {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> WriteState {
        self.rx.borrow().clone()
    }

    /// Waits for the background write to finish.
    ///
    /// If the background task vanished first, the last known state is
    /// returned.
    pub async fn settled(&self) -> WriteState {
        let mut rx = self.rx.clone();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.is_settled() {
                return state;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Runs writes in the background and acknowledges them immediately.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn RemoteStore>,
    outbox: Option<Arc<dyn OutboxStore>>,
    runtime: Handle,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        outbox: Option<Arc<dyn OutboxStore>>,
        runtime: Handle,
    ) -> Self {
        SyncCoordinator {
            store,
            outbox,
            runtime,
        }
    }

    /// Starts a write and returns at once with the ticket in
    /// [`WriteState::OptimisticAck`].
    ///
    /// The caller is responsible for having invalidated the affected caches.
    pub fn submit(&self, op: WriteOp) -> WriteTicket {
        let requested_at = Utc::now();
        let (tx, rx) = watch::channel(WriteState::Requested);
        let ticket = WriteTicket {
            collection: op.collection(),
            id: op.id().to_string(),
            rx,
        };
        tx.send_replace(WriteState::OptimisticAck);

        let store = Arc::clone(&self.store);
        let outbox = self.outbox.clone();
        self.runtime.spawn(async move {
            let outcome = run_write(store.as_ref(), outbox.as_deref(), &op, requested_at).await;
            tx.send_replace(outcome);
        });

        ticket
    }
}

async fn run_write(
    store: &dyn RemoteStore,
    outbox: Option<&dyn OutboxStore>,
    op: &WriteOp,
    requested_at: DateTime<Utc>,
) -> WriteState {
    let collection = op.collection();
    let id = op.id();

    match apply_write(store, op).await {
        Ok(()) => {
            if let Some(outbox) = outbox {
                match outbox.supersede(collection, id, requested_at).await {
                    Ok(0) => {}
                    Ok(dropped) => debug!(collection = %collection, id = %id, dropped, "Dropped queued retries superseded by this write"),
                    Err(e) => warn!(collection = %collection, id = %id, error = %e, "Failed to prune queued retries"),
                }
            }
            debug!(collection = %collection, id = %id, op = op.kind(), "Background write synced");
            WriteState::BackgroundSynced
        }
        Err(e) => {
            warn!(collection = %collection, id = %id, op = op.kind(), error = %e, "Background write failed");
            if let Some(outbox) = outbox {
                match outbox.enqueue(op, requested_at).await {
                    Ok(true) => info!(collection = %collection, id = %id, "Write queued for retry"),
                    Ok(false) => debug!(collection = %collection, id = %id, "Newer write already queued"),
                    Err(qe) => error!(collection = %collection, id = %id, error = %qe, "Failed to queue write for retry"),
                }
            }
            WriteState::BackgroundFailed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::MemoryOutbox;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn coordinator(store: &Arc<MemoryStore>, outbox: &Arc<MemoryOutbox>) -> SyncCoordinator {
        SyncCoordinator::new(
            store.clone(),
            Some(outbox.clone() as Arc<dyn OutboxStore>),
            Handle::current(),
        )
    }

    fn pricing_upsert(rate: i64) -> WriteOp {
        WriteOp::Upsert {
            collection: Collection::Pricing,
            id: "Mix_100gm".into(),
            data: json!({ "tea_type": "Mix", "package": "100gm", "rate": rate }),
            reconcile: Some(Reconcile {
                filters: vec![Filter::eq("tea_type", "Mix"), Filter::eq("package", "100gm")],
            }),
        }
    }

    #[tokio::test]
    async fn test_ticket_is_acknowledged_before_completion() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        store.set_latency(Some(std::time::Duration::from_millis(50)));

        let ticket = coordinator(&store, &outbox).submit(pricing_upsert(4000));
        assert_eq!(ticket.state(), WriteState::OptimisticAck);
        assert_eq!(ticket.id(), "Mix_100gm");

        assert_eq!(ticket.settled().await, WriteState::BackgroundSynced);
        assert!(store.document(Collection::Pricing, "Mix_100gm").is_some());
    }

    #[tokio::test]
    async fn test_reconciliation_leaves_only_canonical_document() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        store.seed(
            Collection::Pricing,
            "Mix_100gm",
            json!({ "tea_type": "Mix", "package": "100gm", "rate": 3500 }),
        );
        store.seed(
            Collection::Pricing,
            "9f1c2a",
            json!({ "tea_type": "Mix", "package": "100gm", "rate": 3000 }),
        );
        store.seed(
            Collection::Pricing,
            "Mix_250gm",
            json!({ "tea_type": "Mix", "package": "250gm", "rate": 9500 }),
        );

        let ticket = coordinator(&store, &outbox).submit(pricing_upsert(4000));
        assert_eq!(ticket.settled().await, WriteState::BackgroundSynced);

        assert_eq!(store.ids(Collection::Pricing), vec!["Mix_100gm", "Mix_250gm"]);
        assert_eq!(
            store.document(Collection::Pricing, "Mix_100gm").unwrap()["rate"],
            4000
        );
    }

    #[tokio::test]
    async fn test_failed_write_is_queued() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        store.set_fail_writes(true);

        let ticket = coordinator(&store, &outbox).submit(WriteOp::Delete {
            collection: Collection::Notes,
            id: "n1".into(),
        });
        assert!(matches!(ticket.settled().await, WriteState::BackgroundFailed(_)));

        let pending = outbox.pending(10, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op.id(), "n1");
    }

    #[tokio::test]
    async fn test_success_supersedes_older_queued_retry() {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::new());
        outbox
            .enqueue(&pricing_upsert(3000), Utc::now() - chrono::Duration::minutes(5))
            .await
            .unwrap();

        let ticket = coordinator(&store, &outbox).submit(pricing_upsert(4000));
        ticket.settled().await;
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_survives_query_failure() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        let removed =
            reconcile_duplicates(&store, Collection::Villages, "Rampur", &[Filter::eq("name", "Rampur")])
                .await;
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_write_op_serialization() {
        let op = pricing_upsert(4000);
        let encoded = serde_json::to_string(&op).unwrap();
        assert!(encoded.contains("\"op\":\"upsert\""));
        let decoded: WriteOp = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, op);
        assert_eq!(WriteState::BackgroundFailed("x".into()).to_string(), "failed: x");
    }
}
