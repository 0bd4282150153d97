//! Single-slot cache for one bounded date-range query.
//!
//! Holds the most recent `(start, end) → items` result and reuses it only
//! for the exact same boundaries while fresh. Asking for another range
//! replaces the slot.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{is_fresh, read, write};
use crate::error::SyncResult;

type Range = (DateTime<Utc>, DateTime<Utc>);

struct Slot<T> {
    entry: Option<(Range, Arc<Vec<T>>, Instant)>,
    generation: u64,
}

pub struct DateRangeCache<T> {
    name: &'static str,
    ttl: Duration,
    slot: RwLock<Slot<T>>,
}

impl<T: Clone> DateRangeCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        DateRangeCache {
            name,
            ttl,
            slot: RwLock::new(Slot {
                entry: None,
                generation: 0,
            }),
        }
    }

    fn lookup(&self, range: Range, require_fresh: bool) -> Option<Vec<T>> {
        let slot = read(&self.slot);
        let (cached_range, items, at) = slot.entry.as_ref()?;
        if *cached_range != range || (require_fresh && !is_fresh(*at, self.ttl)) {
            return None;
        }
        Some(items.as_ref().clone())
    }

    pub fn get_valid(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Vec<T>> {
        self.lookup((start, end), true)
    }

    pub fn invalidate(&self) {
        let mut slot = write(&self.slot);
        slot.entry = None;
        slot.generation += 1;
    }

    /// Serves the slot on an exact fresh match, otherwise runs `fetch` and
    /// replaces the slot. A failed fetch falls back to a stale entry for the
    /// same range.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        force_refresh: bool,
        fetch: F,
    ) -> SyncResult<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Vec<T>>>,
    {
        let range = (start, end);
        if !force_refresh {
            if let Some(hit) = self.lookup(range, true) {
                debug!(cache = self.name, count = hit.len(), "range cache hit");
                return Ok(hit);
            }
        }

        let generation = read(&self.slot).generation;
        match fetch().await {
            Ok(items) => {
                let mut slot = write(&self.slot);
                if slot.generation == generation {
                    slot.entry = Some((range, Arc::new(items.clone()), Instant::now()));
                }
                Ok(items)
            }
            Err(e) => match self.lookup(range, false) {
                Some(stale) => {
                    warn!(cache = self.name, error = %e, "Serving stale range");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_millis(240_000);

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_boundary_match_only() {
        let cache = DateRangeCache::new("sales_range", TTL);
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec![1, 2, 3]) }
        };

        cache.get_or_fetch(day(1), day(31), false, fetch).await.unwrap();
        cache.get_or_fetch(day(1), day(31), false, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.get_or_fetch(day(2), day(31), false, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The slot now holds the second range only
        assert!(cache.get_valid(day(1), day(31)).is_none());
        assert!(cache.get_valid(day(2), day(31)).is_some());

        tokio::time::advance(TTL).await;
        assert!(cache.get_valid(day(2), day(31)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_clears_slot() {
        let cache = DateRangeCache::new("sales_range", TTL);
        cache
            .get_or_fetch(day(1), day(7), false, || async { Ok(vec!["a"]) })
            .await
            .unwrap();
        cache.invalidate();
        assert!(cache.get_valid(day(1), day(7)).is_none());
    }
}
