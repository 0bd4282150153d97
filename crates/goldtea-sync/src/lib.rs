//! # goldtea-sync: Cache and Sync Layer for GoldTea Sales
//!
//! This crate sits between the screens and the document store. Reads are
//! served from TTL caches; writes are acknowledged at once and pushed to the
//! store in the background, so the app stays usable with no connection.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Data Service Layout                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 DataService (built once, cloned out)             │  │
//! │  │                                                                  │  │
//! │  │  get_all_* / get_*_page / get_note / load_dashboard   reads      │  │
//! │  │  add_* / update_* / delete_* / record_payment         writes     │  │
//! │  └───────────────┬──────────────────────────────┬───────────────────┘  │
//! │                  │ reads                        │ writes                │
//! │                  ▼                              ▼                       │
//! │  ┌────────────────────────────┐   ┌──────────────────────────────────┐ │
//! │  │          Caches            │   │        SyncCoordinator           │ │
//! │  │                            │◄──┤                                  │ │
//! │  │ CollectionCache   (lists)  │ clear │ optimistic ack, background   │ │
//! │  │ PaginatedCursorCache (p.1) │   │ write, duplicate reconciliation  │ │
//! │  │ DateRangeCache  (reports)  │   └───────┬────────────────┬─────────┘ │
//! │  │ EntityLruCache  (notes)    │           │ ok             │ failed    │
//! │  └─────────────┬──────────────┘           │                ▼           │
//! │                │ miss                     │   ┌──────────────────────┐ │
//! │                │                          │   │ Outbox + Processor   │ │
//! │                │                          │   │ retry with backoff   │ │
//! │                ▼                          ▼   └──────────┬───────────┘ │
//! │  ┌──────────────────────────────────────────────────────▼───────────┐  │
//! │  │            RemoteStore  (SqliteStore | MemoryStore)              │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ConnectivityMonitor: online/offline for display; nothing waits on it  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - `DataService` façade and its builder
//! - [`cache`] - The four read caches
//! - [`coordinator`] - Optimistic writes, write tickets, reconciliation
//! - [`outbox`] - Retry queue for failed background writes
//! - [`store`] - `RemoteStore` contract and its adapters
//! - [`entity`] - How each record maps to a collection and an id
//! - [`connectivity`] - Online/offline status
//! - [`config`] - TOML configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use goldtea_db::{Database, DbConfig};
//! use goldtea_sync::{DataServiceBuilder, GoldteaConfig, SqliteOutbox, SqliteStore};
//!
//! let config = GoldteaConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(config.database_path())).await?;
//!
//! let service = DataServiceBuilder::new(config)
//!     .with_store(Arc::new(SqliteStore::new(&db)))
//!     .with_outbox(Arc::new(SqliteOutbox::new(&db)))
//!     .build()?;
//! let _outbox = service.start_outbox_processor();
//!
//! let summary = service.load_dashboard(&chrono::Local::now()).await?;
//! println!("Month to date: {}", summary.total_sales);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod outbox;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CollectionCache, DateRangeCache, EntityLruCache, Page, PaginatedCursorCache};
pub use config::GoldteaConfig;
pub use connectivity::{ConnectionStatus, ConnectivityMonitor, ConnectivityProbe, TcpProbe};
pub use coordinator::{SyncCoordinator, WriteOp, WriteState, WriteTicket};
pub use error::{SyncError, SyncResult};
pub use outbox::{MemoryOutbox, OutboxProcessor, OutboxProcessorHandle, OutboxStore, SqliteOutbox};
pub use service::{DataService, DataServiceBuilder};
pub use store::{MemoryStore, RemoteStore, SqliteStore};
