//! # In-Memory Store
//!
//! A [`RemoteStore`] kept in process. Ordering, filtering and cursor
//! semantics match the SQLite repository, so either backend can sit behind
//! the service.
//!
//! Besides backing the CLI's `--memory` mode, it carries the knobs tests
//! need: per-operation counters, failure injection, artificial latency and
//! raw seeding that bypasses the write path.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use goldtea_core::{Collection, Document, DocumentQuery};

use super::RemoteStore;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicUsize,
    queries: AtomicUsize,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
}

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    counters: Counters,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding and Inspection
    // =========================================================================

    /// Stores a document directly, without counting it as an upsert.
    pub fn seed(&self, collection: Collection, id: &str, data: Value) {
        self.lock()
            .entry(collection)
            .or_default()
            .insert(id.to_string(), data);
    }

    /// The stored body, if any.
    pub fn document(&self, collection: Collection, id: &str) -> Option<Value> {
        self.lock().get(&collection).and_then(|docs| docs.get(id).cloned())
    }

    /// Every id in a collection, sorted.
    pub fn ids(&self, collection: Collection) -> Vec<String> {
        self.lock()
            .get(&collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.lock().get(&collection).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    // =========================================================================
    // Counters
    // =========================================================================

    pub fn get_count(&self) -> usize {
        self.counters.gets.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> usize {
        self.counters.upserts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.counters.gets.store(0, Ordering::SeqCst);
        self.counters.queries.store(0, Ordering::SeqCst);
        self.counters.upserts.store(0, Ordering::SeqCst);
        self.counters.deletes.store(0, Ordering::SeqCst);
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Makes `get_by_id` and `query` fail as if offline.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `upsert` and `delete` fail as if offline.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, HashMap<Collection, BTreeMap<String, Value>>> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(&self, flag: &AtomicBool) -> SyncResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(SyncError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_by_id(&self, collection: Collection, id: &str) -> SyncResult<Option<Document>> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check(&self.fail_reads)?;

        Ok(self
            .document(collection, id)
            .map(|data| Document::new(id, data)))
    }

    async fn query(&self, collection: Collection, query: &DocumentQuery) -> SyncResult<Vec<Document>> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check(&self.fail_reads)?;
        query
            .validate()
            .map_err(|e| SyncError::InvalidQuery(e.to_string()))?;

        let mut docs: Vec<Document> = {
            let guard = self.lock();
            guard
                .get(&collection)
                .map(|docs| {
                    docs.iter()
                        .map(|(id, data)| Document::new(id.as_str(), data.clone()))
                        .filter(|doc| query.filters.iter().all(|f| f.matches(&doc.data)))
                        .collect()
                })
                .unwrap_or_default()
        };

        if let Some(cursor) = &query.start_after {
            match &query.order_by {
                Some(order) => docs.retain(|doc| cursor.precedes(doc, order)),
                None => docs.retain(|doc| doc.id > cursor.id),
            }
        }

        docs.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        debug!(collection = %collection, count = docs.len(), "memory query");
        Ok(docs)
    }

    async fn upsert(&self, collection: Collection, id: &str, data: &Value) -> SyncResult<()> {
        self.counters.upserts.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check(&self.fail_writes)?;

        self.seed(collection, id, data.clone());
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> SyncResult<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check(&self.fail_writes)?;

        if let Some(docs) = self.lock().get_mut(&collection) {
            docs.remove(id);
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldtea_core::{Cursor, Filter, OrderBy};
    use serde_json::json;

    fn store_with_sales() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, date) in [("a", 30), ("b", 40), ("c", 30), ("d", 40), ("e", 10)] {
            store.seed(Collection::Sales, id, json!({ "date": date, "village": "Rampur" }));
        }
        store.seed(Collection::Sales, "x", json!({ "date": 50, "village": "Kheri" }));
        store
    }

    #[tokio::test]
    async fn test_filter_order_and_cursor_pages() {
        let store = store_with_sales();
        let base = DocumentQuery::new()
            .filter(Filter::eq("village", "Rampur"))
            .order_by(OrderBy::desc("date"))
            .limit(2);

        let page1 = store.query(Collection::Sales, &base).await.unwrap();
        let ids: Vec<_> = page1.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b"]);

        let order = OrderBy::desc("date");
        let cursor = Cursor::at(page1.last().unwrap(), &order);
        let page2 = store
            .query(Collection::Sales, &base.clone().start_after(Some(cursor)))
            .await
            .unwrap();
        let ids: Vec<_> = page2.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let cursor = Cursor::at(page2.last().unwrap(), &order);
        let page3 = store
            .query(Collection::Sales, &base.start_after(Some(cursor)))
            .await
            .unwrap();
        let ids: Vec<_> = page3.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["e"]);

        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = store_with_sales();
        store.set_fail_reads(true);
        let err = store
            .query(Collection::Sales, &DocumentQuery::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        store.set_fail_reads(false);
        store.set_fail_writes(true);
        assert!(store.get_by_id(Collection::Sales, "a").await.unwrap().is_some());
        assert!(store.delete(Collection::Sales, "a").await.is_err());
        assert_eq!(store.len(Collection::Sales), 6);
    }

    #[tokio::test]
    async fn test_seed_is_not_counted() {
        let store = MemoryStore::new();
        store.seed(Collection::Notes, "n1", json!({ "title": "t" }));
        assert_eq!(store.upsert_count(), 0);

        store.upsert(Collection::Notes, "n2", &json!({})).await.unwrap();
        assert_eq!(store.upsert_count(), 1);
        assert_eq!(store.ids(Collection::Notes), vec!["n1", "n2"]);
    }
}
