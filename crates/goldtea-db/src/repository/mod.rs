//! # Repository Module
//!
//! Database repository implementations for GoldTea Sales.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  goldtea-sync adapter          Repository                Table          │
//! │  ─────────────────────         ──────────────────────    ────────────── │
//! │  SqliteStore (RemoteStore) ──► DocumentRepository    ──► documents      │
//! │  SqliteOutbox (OutboxStore) ─► PendingWriteRepository ─► pending_writes │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`DocumentRepository`] - JSON documents with filtered, cursor-paged queries
//! - [`PendingWriteRepository`] - Durable queue of writes awaiting retry

pub mod document;
pub mod pending;

pub use document::DocumentRepository;
pub use pending::{PendingWriteEntry, PendingWriteRepository};

use chrono::{DateTime, Utc};

/// Epoch milliseconds, the on-disk timestamp format.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
