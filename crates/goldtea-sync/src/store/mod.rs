//! # Document Store Boundary
//!
//! The four operations the sync layer needs from a document database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RemoteStore                                     │
//! │                                                                         │
//! │   get_by_id(collection, id)        → Option<Document>                  │
//! │   query(collection, DocumentQuery) → Vec<Document> (ordered)           │
//! │   upsert(collection, id, body)     → ()                                │
//! │   delete(collection, id)           → ()                                │
//! │                                                                         │
//! │          ▲                                   ▲                          │
//! │          │                                   │                          │
//! │   ┌──────┴───────┐                   ┌───────┴──────┐                   │
//! │   │ MemoryStore  │                   │ SqliteStore  │                   │
//! │   │ (in process) │                   │ (goldtea-db) │                   │
//! │   └──────────────┘                   └──────────────┘                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every document returned carries its store-assigned id. Transient failures
//! surface as [`SyncError::Unavailable`](crate::error::SyncError::Unavailable).

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;

use goldtea_core::{Collection, Document, DocumentQuery};

use crate::error::SyncResult;

/// Abstract document database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches one document, `None` when absent.
    async fn get_by_id(&self, collection: Collection, id: &str) -> SyncResult<Option<Document>>;

    /// Runs a filtered, ordered, cursor-paged query.
    async fn query(&self, collection: Collection, query: &DocumentQuery) -> SyncResult<Vec<Document>>;

    /// Creates or replaces the document stored under `id`.
    async fn upsert(&self, collection: Collection, id: &str, data: &Value) -> SyncResult<()>;

    /// Removes a document. Deleting an absent id succeeds.
    async fn delete(&self, collection: Collection, id: &str) -> SyncResult<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
