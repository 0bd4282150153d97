//! # Caches
//!
//! Four read caches sit in front of the document store. All share one TTL
//! and all are cleared synchronously by writes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CollectionCache<T>        whole listings: villages, pricing,          │
//! │                            customers, notes                             │
//! │                                                                         │
//! │  PaginatedCursorCache<T>   page one of sales / notes; later pages      │
//! │                            always go to the store                       │
//! │                                                                         │
//! │  DateRangeCache<T>         one (start, end) slot for dashboard and      │
//! │                            report ranges                                │
//! │                                                                         │
//! │  EntityLruCache<T>         single notes by id, capacity 5,              │
//! │                            least-recently-accessed evicted first        │
//! │                                                                         │
//! │  Entry valid while  now − fetched_at < ttl                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invalidation Generations
//! Every cache counts its invalidations. A fetch notes the generation before
//! it starts and only publishes its result if no invalidation happened in
//! between; the caller still gets the result either way. A read racing a
//! write therefore cannot put pre-write data back into a cache the write
//! just cleared.
//!
//! Timestamps come from `tokio::time::Instant`, so paused-clock tests can
//! walk across the TTL boundary exactly.

mod collection;
mod lru;
mod paginated;
mod range;

pub use collection::CollectionCache;
pub use lru::EntityLruCache;
pub use paginated::{Page, PaginatedCursorCache};
pub use range::DateRangeCache;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Whether something fetched at `fetched_at` is still fresh.
pub(crate) fn is_fresh(fetched_at: Instant, ttl: Duration) -> bool {
    fetched_at.elapsed() < ttl
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
