//! # goldtea-core: Pure Domain Logic for GoldTea Sales
//!
//! This crate holds the record types, money arithmetic, identity rules and
//! query vocabulary shared by the database layer and the cache/sync layer.
//! Nothing in here touches a disk, a socket or a clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       GoldTea Sales Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              UI (forms, dashboard, charts) - external           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        goldtea-sync: DataService (caches + optimistic writes)   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ goldtea-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  money   │ │ identity │ │  query   │          │   │
//! │  │   │ Sale     │ │  Money   │ │ canonical│ │ Filter   │          │   │
//! │  │   │ Village  │ │ (paise)  │ │   ids    │ │ Cursor   │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐                                     │   │
//! │  │   │validation│ │  report  │   NO I/O • PURE FUNCTIONS           │   │
//! │  │   └──────────┘ └──────────┘                                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (Sale, Village, Pricing, Customer, Note)
//! - [`money`] - Money type with integer arithmetic (paise)
//! - [`identity`] - Canonical id derivation for deterministic-id records
//! - [`query`] - Collections, filters, ordering and cursors
//! - [`validation`] - Input validation
//! - [`report`] - Dashboard and period aggregation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use goldtea_core::identity::{pricing_key, village_id};
//!
//! assert_eq!(village_id("  Rampur "), "Rampur");
//! assert_eq!(pricing_key("", "100gm"), "Mix_100gm");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod money;
pub mod query;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use query::{Collection, Cursor, Direction, Document, DocumentQuery, Filter, FilterOp, OrderBy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// How long a cached read stays valid, in milliseconds.
///
/// Uniform across every cache in the sync layer. Four minutes is long
/// enough to make tab switching free and short enough that a second
/// device's writes show up without a manual refresh.
pub const DEFAULT_CACHE_TTL_MS: u64 = 240_000;

/// Capacity of the single-note LRU cache.
pub const DEFAULT_NOTE_CACHE_CAPACITY: usize = 5;

/// Tea type assumed when a pricing record carries none.
pub const DEFAULT_TEA_TYPE: &str = "Mix";

/// Upper bound for a single page request.
pub const MAX_PAGE_SIZE: usize = 500;
