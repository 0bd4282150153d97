//! # Page-One Cache
//!
//! Cursor listings (sales, notes) cache only their first page.
//!
//! ```text
//!   get_page(size, cursor = None, force = false)
//!        │
//!        ├── fresh page one cached ──► (items, next_cursor = None)
//!        │
//!        └── otherwise ──► store query ──► cache as page one
//!                                      ──► (items, cursor at last item)
//!
//!   get_page(size, cursor = Some(c), _)
//!        └── always ──► store query starting after c  (never cached)
//! ```
//!
//! A cached page one comes back without a cursor; the caller that wants
//! more refreshes instead of paging off cached data. A page is the last one
//! when the store returned fewer documents than requested. Documents that
//! failed to decode still count, so a skipped record never ends paging early.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use goldtea_core::Cursor;

use super::{is_fresh, read, write};
use crate::error::SyncResult;

/// One page of a cursor listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Position of the last item, `None` for an empty or cached page.
    pub next_cursor: Option<Cursor>,
    /// Documents the store returned, decodable or not.
    pub fetched: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            next_cursor: None,
            fetched: 0,
        }
    }

    /// True when the store came back short of the requested size.
    pub fn is_last(&self, page_size: usize) -> bool {
        self.fetched < page_size
    }
}

struct Slot<T> {
    items: Option<Arc<Vec<T>>>,
    fetched: usize,
    fetched_at: Option<Instant>,
    generation: u64,
}

pub struct PaginatedCursorCache<T> {
    name: &'static str,
    ttl: Duration,
    slot: RwLock<Slot<T>>,
}

impl<T: Clone> PaginatedCursorCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        PaginatedCursorCache {
            name,
            ttl,
            slot: RwLock::new(Slot {
                items: None,
                fetched: 0,
                fetched_at: None,
                generation: 0,
            }),
        }
    }

    /// Page one as cached, without a cursor.
    fn cached_page(slot: &Slot<T>) -> Option<Page<T>> {
        slot.items.as_ref().map(|items| Page {
            items: items.as_ref().clone(),
            next_cursor: None,
            fetched: slot.fetched,
        })
    }

    fn valid_first_page(&self) -> Option<Page<T>> {
        let slot = read(&self.slot);
        match slot.fetched_at {
            Some(at) if is_fresh(at, self.ttl) => Self::cached_page(&slot),
            _ => None,
        }
    }

    fn any_first_page(&self) -> Option<Page<T>> {
        Self::cached_page(&read(&self.slot))
    }

    pub fn has_valid_first_page(&self) -> bool {
        self.valid_first_page().is_some()
    }

    pub fn generation(&self) -> u64 {
        read(&self.slot).generation
    }

    fn store_first_page(&self, generation: u64, items: Vec<T>, fetched: usize) {
        let mut slot = write(&self.slot);
        if slot.generation != generation {
            debug!(cache = self.name, "Discarding page one that raced an invalidation");
            return;
        }
        slot.items = Some(Arc::new(items));
        slot.fetched = fetched;
        slot.fetched_at = Some(Instant::now());
    }

    pub fn invalidate(&self) {
        let mut slot = write(&self.slot);
        slot.items = None;
        slot.fetched = 0;
        slot.fetched_at = None;
        slot.generation += 1;
    }

    /// Returns one page.
    ///
    /// `fetch(page_size, cursor)` runs the live query and returns the items
    /// with the cursor at the last document. If page one cannot be fetched, a
    /// stale cached page one is served when held.
    pub async fn get_page<F, Fut>(
        &self,
        page_size: usize,
        cursor: Option<Cursor>,
        force_refresh: bool,
        fetch: F,
    ) -> SyncResult<Page<T>>
    where
        F: FnOnce(usize, Option<Cursor>) -> Fut,
        Fut: Future<Output = SyncResult<Page<T>>>,
    {
        if cursor.is_some() {
            debug!(cache = self.name, page_size, "continuing listing from cursor");
            return fetch(page_size, cursor).await;
        }

        if !force_refresh {
            if let Some(page) = self.valid_first_page() {
                debug!(cache = self.name, count = page.items.len(), "page one cache hit");
                return Ok(page);
            }
        }

        let generation = self.generation();
        match fetch(page_size, None).await {
            Ok(page) => {
                self.store_first_page(generation, page.items.clone(), page.fetched);
                Ok(page)
            }
            Err(e) => match self.any_first_page() {
                Some(page) => {
                    warn!(cache = self.name, error = %e, "Serving stale page one");
                    Ok(page)
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
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_millis(240_000);

    fn numbered(from: u32, count: u32) -> Page<u32> {
        let items: Vec<u32> = (from..from + count).collect();
        let next_cursor = items.last().map(|last| Cursor {
            value: json!(last),
            id: last.to_string(),
        });
        let fetched = items.len();
        Page {
            items,
            next_cursor,
            fetched,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_page_is_cached_without_cursor() {
        let cache = PaginatedCursorCache::new("sales", TTL);
        let calls = AtomicUsize::new(0);
        let fetch = |size: usize, _cursor: Option<Cursor>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(numbered(0, size as u32)) }
        };

        let live = cache.get_page(50, None, false, fetch).await.unwrap();
        assert!(live.next_cursor.is_some());

        let cached = cache.get_page(50, None, false, fetch).await.unwrap();
        assert_eq!(cached.items, live.items);
        assert!(cached.next_cursor.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.get_page(50, None, true, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_requests_never_hit_cache() {
        let cache = PaginatedCursorCache::new("notes", TTL);
        let calls = AtomicUsize::new(0);
        let fetch = |_size: usize, cursor: Option<Cursor>| {
            calls.fetch_add(1, Ordering::SeqCst);
            let from = if cursor.is_some() { 50 } else { 0 };
            async move { Ok(numbered(from, if from == 0 { 50 } else { 30 })) }
        };

        let first = cache.get_page(50, None, false, fetch).await.unwrap();
        let second = cache
            .get_page(50, first.next_cursor.clone(), false, fetch)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.items.len(), 30);
        assert!(second.is_last(50));
        assert!(!first.is_last(50));

        // The continuation did not replace the cached page one
        let again = cache.get_page(50, None, false, fetch).await.unwrap();
        assert_eq!(again.items, first.items);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_page_one_on_failure() {
        let cache = PaginatedCursorCache::new("sales", TTL);
        cache
            .get_page(10, None, false, |size, _| async move { Ok(numbered(0, size as u32)) })
            .await
            .unwrap();
        tokio::time::advance(TTL).await;

        let failing = |_: usize, _: Option<Cursor>| async {
            Err::<Page<u32>, _>(SyncError::Unavailable("offline".into()))
        };
        let stale = cache.get_page(10, None, false, failing).await.unwrap();
        assert_eq!(stale.items.len(), 10);
        assert!(stale.next_cursor.is_none());

        let cursor = Some(Cursor {
            value: json!(9),
            id: "9".into(),
        });
        assert!(cache.get_page(10, cursor, false, failing).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_documents_do_not_end_listing() {
        let cache = PaginatedCursorCache::new("sales", TTL);
        let fetch = |size: usize, _cursor: Option<Cursor>| async move {
            // One of the fetched documents failed to decode
            let mut page = numbered(0, size as u32);
            page.items.pop();
            Ok(page)
        };

        let live = cache.get_page(50, None, false, fetch).await.unwrap();
        assert_eq!((live.items.len(), live.fetched), (49, 50));
        assert!(!live.is_last(50));

        let cached = cache.get_page(50, None, false, fetch).await.unwrap();
        assert_eq!(cached.fetched, 50);
        assert!(!cached.is_last(50));
    }

    #[test]
    fn test_empty_page() {
        let page: Page<u32> = Page::empty();
        assert!(page.is_last(1));
        assert!(page.next_cursor.is_none());
    }
}
