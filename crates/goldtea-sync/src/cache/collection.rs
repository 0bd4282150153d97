//! TTL cache of one complete listing.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{is_fresh, read, write};
use crate::error::SyncResult;

struct Slot<T> {
    entries: Option<Arc<Vec<T>>>,
    fetched_at: Option<Instant>,
    generation: u64,
}

/// Caches the result of a "load everything" query.
///
/// The stored sequence is swapped as a whole, so readers see either the
/// previous listing or the complete new one. Hits hand out a copy.
pub struct CollectionCache<T> {
    name: &'static str,
    ttl: Duration,
    slot: RwLock<Slot<T>>,
}

impl<T: Clone> CollectionCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        CollectionCache {
            name,
            ttl,
            slot: RwLock::new(Slot {
                entries: None,
                fetched_at: None,
                generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The cached listing if it is still fresh.
    pub fn get_valid(&self) -> Option<Vec<T>> {
        let slot = read(&self.slot);
        match (&slot.entries, slot.fetched_at) {
            (Some(entries), Some(at)) if is_fresh(at, self.ttl) => Some(entries.as_ref().clone()),
            _ => None,
        }
    }

    /// The cached listing regardless of age.
    pub fn get_any(&self) -> Option<Vec<T>> {
        read(&self.slot).entries.as_ref().map(|e| e.as_ref().clone())
    }

    pub fn is_valid(&self) -> bool {
        let slot = read(&self.slot);
        slot.entries.is_some() && slot.fetched_at.is_some_and(|at| is_fresh(at, self.ttl))
    }

    pub fn generation(&self) -> u64 {
        read(&self.slot).generation
    }

    /// Publishes a fetched listing unless the cache was invalidated since
    /// `generation` was read. Returns whether it was stored.
    pub fn store(&self, generation: u64, entries: Vec<T>) -> bool {
        let mut slot = write(&self.slot);
        if slot.generation != generation {
            debug!(cache = self.name, "Discarding fetch that raced an invalidation");
            return false;
        }
        slot.entries = Some(Arc::new(entries));
        slot.fetched_at = Some(Instant::now());
        true
    }

    /// Clears the listing and its fetch time.
    pub fn invalidate(&self) {
        let mut slot = write(&self.slot);
        slot.entries = None;
        slot.fetched_at = None;
        slot.generation += 1;
    }

    /// Serves a fresh hit, or runs `fetch` and caches what it returns.
    ///
    /// When `fetch` fails, a stale listing is returned if one is held;
    /// otherwise the error propagates.
    pub async fn get_or_fetch<F, Fut>(&self, force_refresh: bool, fetch: F) -> SyncResult<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Vec<T>>>,
    {
        if !force_refresh {
            if let Some(hit) = self.get_valid() {
                debug!(cache = self.name, count = hit.len(), "cache hit");
                return Ok(hit);
            }
        }

        let generation = self.generation();
        debug!(cache = self.name, force_refresh, "cache miss, querying store");

        match fetch().await {
            Ok(entries) => {
                self.store(generation, entries.clone());
                Ok(entries)
            }
            Err(e) => match self.get_any() {
                Some(stale) => {
                    warn!(cache = self.name, error = %e, count = stale.len(), "Serving stale listing");
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
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_millis(240_000);

    async fn load(cache: &CollectionCache<u32>, calls: &AtomicUsize, force: bool) -> Vec<u32> {
        cache
            .get_or_fetch(force, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                Ok((0..10).map(|i| i + n * 100).collect())
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary() {
        let cache = CollectionCache::new("sales", TTL);
        let calls = AtomicUsize::new(0);

        let first = load(&cache, &calls, false).await;
        assert_eq!(first.len(), 10);

        tokio::time::advance(Duration::from_millis(239_999)).await;
        assert_eq!(load(&cache, &calls, false).await, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_ne!(load(&cache, &calls, false).await, first);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_bypasses_valid_entry() {
        let cache = CollectionCache::new("villages", TTL);
        let calls = AtomicUsize::new(0);

        load(&cache, &calls, false).await;
        load(&cache, &calls, true).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_on_error() {
        let cache = CollectionCache::new("pricing", TTL);
        let calls = AtomicUsize::new(0);
        let cached = load(&cache, &calls, false).await;

        tokio::time::advance(TTL).await;
        let served = cache
            .get_or_fetch(false, || async { Err(SyncError::Unavailable("offline".into())) })
            .await
            .unwrap();
        assert_eq!(served, cached);

        cache.invalidate();
        let err = cache
            .get_or_fetch(false, || async { Err(SyncError::Unavailable("offline".into())) })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_store_after_invalidation_is_discarded() {
        let cache = CollectionCache::new("customers", TTL);
        let generation = cache.generation();
        cache.invalidate();

        assert!(!cache.store(generation, vec![1, 2, 3]));
        assert!(cache.get_any().is_none());

        assert!(cache.store(cache.generation(), vec![4]));
        assert_eq!(cache.get_any(), Some(vec![4]));
    }

    #[test]
    fn test_hits_are_copies() {
        let cache = CollectionCache::new("notes", TTL);
        cache.store(0, vec![1, 2]);

        let mut hit = cache.get_valid().unwrap();
        hit.push(3);
        assert_eq!(cache.get_valid().unwrap(), vec![1, 2]);
    }
}
