//! # goldtea-db: Database Layer for GoldTea Sales
//!
//! SQLite storage for two things: a JSON document store that can back the
//! sync layer in place of the remote store, and the durable queue of writes
//! waiting to be retried.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GoldTea Data Flow                                │
//! │                                                                         │
//! │  DataService (goldtea-sync)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    goldtea-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐   ┌─────────────┐  │   │
//! │  │   │   Database    │    │   Repositories   │   │ Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ DocumentRepo     │   │ (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ PendingWriteRepo │   │ 001, 002    │  │   │
//! │  │   └───────────────┘    └──────────────────┘   └─────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  <platform data dir>/goldtea.db                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Document and pending-write repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use goldtea_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("goldtea.db")).await?;
//! db.documents().upsert("villages", "Rampur", &json!({"name": "Rampur"})).await?;
//! let pending = db.pending_writes().count_pending().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::document::DocumentRepository;
pub use repository::pending::{PendingWriteEntry, PendingWriteRepository};
