//! # Entity LRU Cache
//!
//! A small bounded cache of single entities by id, ordered by access.
//!
//! ## Layout
//! ```text
//!   map: id ──► slot index
//!
//!   slots (arena, doubly linked by index)
//!
//!   head (most recent)                              tail (least recent)
//!     ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
//!     │ n-42 │ ◄► │ n-17 │ ◄► │ n-03 │ ◄► │ n-99 │ ◄► │ n-08 │ ──► evicted
//!     └──────┘    └──────┘    └──────┘    └──────┘    └──────┘     on insert
//!                                                                  #6
//!   get(id)    hit  → unlink + push to head
//!              expired → unlink + free, report a miss
//!   insert(id) new  → push to head, evict tail past capacity
//! ```
//!
//! Every entry carries its own fetch time and expires under the shared TTL.
//! A single mutex guards the map and the list together, so overlapping
//! fetches never observe a half-moved node.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::is_fresh;
use crate::error::SyncResult;

struct Node<T> {
    key: String,
    value: T,
    fetched_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruList<T> {
    map: HashMap<String, usize>,
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    generation: u64,
}

impl<T> LruList<T> {
    fn new() -> Self {
        LruList {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            generation: 0,
        }
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.node(idx) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.node_mut(h) {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn allocate(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn remove_index(&mut self, idx: usize) -> Option<Node<T>> {
        self.unlink(idx);
        let node = self.slots.get_mut(idx).and_then(Option::take)?;
        self.map.remove(&node.key);
        self.free.push(idx);
        Some(node)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }
}

/// Bounded, access-ordered cache of entities by id.
pub struct EntityLruCache<T> {
    name: &'static str,
    capacity: usize,
    ttl: Duration,
    inner: Mutex<LruList<T>>,
}

impl<T: Clone> EntityLruCache<T> {
    pub fn new(name: &'static str, capacity: usize, ttl: Duration) -> Self {
        EntityLruCache {
            name,
            capacity,
            ttl,
            inner: Mutex::new(LruList::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruList<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Looks up a fresh entry and marks it most recently used.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut list = self.lock();
        let idx = *list.map.get(key)?;

        let fresh = list
            .node(idx)
            .is_some_and(|node| is_fresh(node.fetched_at, self.ttl));
        if !fresh {
            debug!(cache = self.name, key, "entry expired");
            list.remove_index(idx);
            return None;
        }

        list.unlink(idx);
        list.push_front(idx);
        list.node(idx).map(|node| node.value.clone())
    }

    /// Inserts or refreshes an entry as most recently used.
    ///
    /// Returns the key evicted to stay within capacity, if any.
    pub fn insert(&self, key: &str, value: T) -> Option<String> {
        let mut list = self.lock();
        Self::insert_locked(&mut list, self.capacity, key, value)
    }

    /// Inserts only if nothing was invalidated since `generation`.
    pub fn insert_if_current(&self, generation: u64, key: &str, value: T) -> bool {
        let mut list = self.lock();
        if list.generation != generation {
            debug!(cache = self.name, key, "Discarding entry that raced an invalidation");
            return false;
        }
        Self::insert_locked(&mut list, self.capacity, key, value);
        true
    }

    fn insert_locked(list: &mut LruList<T>, capacity: usize, key: &str, value: T) -> Option<String> {
        if capacity == 0 {
            return None;
        }

        if let Some(&idx) = list.map.get(key) {
            if let Some(node) = list.node_mut(idx) {
                node.value = value;
                node.fetched_at = Instant::now();
            }
            list.unlink(idx);
            list.push_front(idx);
            return None;
        }

        let idx = list.allocate(Node {
            key: key.to_string(),
            value,
            fetched_at: Instant::now(),
            prev: None,
            next: None,
        });
        list.map.insert(key.to_string(), idx);
        list.push_front(idx);

        if list.map.len() > capacity {
            let tail = list.tail?;
            return list.remove_index(tail).map(|node| node.key);
        }
        None
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut list = self.lock();
        match list.map.get(key).copied() {
            Some(idx) => list.remove_index(idx).is_some(),
            None => false,
        }
    }

    /// Clears every entry and its timestamp.
    pub fn invalidate_all(&self) {
        let mut list = self.lock();
        list.clear();
        list.generation += 1;
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        let list = self.lock();
        let mut keys = Vec::with_capacity(list.map.len());
        let mut cursor = list.head;
        while let Some(idx) = cursor {
            match list.node(idx) {
                Some(node) => {
                    keys.push(node.key.clone());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    /// Serves a fresh entry or runs `fetch` and caches its result.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> SyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        if let Some(hit) = self.get(key) {
            debug!(cache = self.name, key, "entity cache hit");
            return Ok(hit);
        }

        let generation = self.generation();
        let value = fetch().await?;
        if self.insert_if_current(generation, key, value.clone()) {
            debug!(cache = self.name, key, size = self.len(), "entity cached");
        }
        Ok(value)
    }
}
