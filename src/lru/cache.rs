//! Single-shard LRU cache: hash map + intrusive recency list.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────┐
//!   │                     LruCore<K, V>                        │
//!   │                                                          │
//!   │   FxHashMap<K, NonNull<Entry>>      (O(1) lookup)        │
//!   │                                                          │
//!   │   head ──► [E] ◄──► [C] ◄──► [A] ◄── tail                │
//!   │            MRU                LRU   (recency order)      │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The map and the doubly-linked list are two views over the same node set:
//! the map finds a node by key in O(1), the list keeps the nodes ordered
//! most-recently-used first. Every public operation leaves `size <= capacity`
//! and the two views describing exactly the same keys.
//!
//! Nodes are heap-allocated and linked through `NonNull` pointers, exactly
//! one node per live key, owned by this core alone. When an insert overflows
//! capacity the tail node is recycled in place for the incoming key: its key
//! and value are overwritten before the node is relinked, so no stale data
//! survives reuse, and the steady-state full-cache insert path performs no
//! allocation.
//!
//! [`LruCore`] is single-threaded (`&mut self`); [`LruCache`] wraps it with
//! hit/access accounting and an eviction callback for callers that do not
//! need sharding. Thread-safe use goes through
//! [`ShardedLruCache`](crate::lru::ShardedLruCache), which wraps one core
//! per shard behind its own lock.

use std::hash::Hash;
use std::mem;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

#[cfg(any(test, debug_assertions))]
use crate::error::InvariantError;
use crate::lru::DEFAULT_CAPACITY;

/// Node in the recency list. List pointers first for traversal locality.
struct Entry<K, V> {
    prev: Option<NonNull<Entry<K, V>>>,
    next: Option<NonNull<Entry<K, V>>>,
    key: K,
    value: V,
}

/// Single-threaded LRU core: one shard's map, list, and capacity bound.
pub(crate) struct LruCore<K, V> {
    map: FxHashMap<K, NonNull<Entry<K, V>>>,
    head: Option<NonNull<Entry<K, V>>>,
    tail: Option<NonNull<Entry<K, V>>>,
    capacity: usize,
}

// SAFETY: the raw pointers only reference heap nodes owned exclusively by
// this core; moving the core between threads moves ownership of all nodes
// with it.
unsafe impl<K: Send, V: Send> Send for LruCore<K, V> {}

// SAFETY: &LruCore only permits reads of the node graph; exclusive access is
// required for any mutation.
unsafe impl<K: Sync, V: Sync> Sync for LruCore<K, V> {}

impl<K, V> LruCore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a core holding at most `capacity` entries. Callers normalize
    /// the capacity; it must be at least 1.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            head: None,
            tail: None,
            capacity,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Read-only lookup that leaves the recency order untouched.
    #[inline]
    pub(crate) fn peek(&self, key: &K) -> Option<&V> {
        self.map
            .get(key)
            .map(|ptr| unsafe { &(*ptr.as_ptr()).value })
    }

    /// Looks up `key` and, on a hit, moves its node to the MRU position.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let ptr = *self.map.get(key)?;
        self.detach(ptr);
        self.attach_front(ptr);
        self.debug_validate();
        Some(unsafe { &(*ptr.as_ptr()).value })
    }

    /// Inserts or updates `key`, returning the entry evicted to make room,
    /// if any. Updates never evict; they replace the value and move the node
    /// to the front.
    pub(crate) fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&ptr) = self.map.get(&key) {
            unsafe {
                (*ptr.as_ptr()).value = value;
            }
            self.detach(ptr);
            self.attach_front(ptr);
            self.debug_validate();
            return None;
        }

        if self.map.len() >= self.capacity {
            if let Some(ptr) = self.tail {
                // Recycle the LRU node in place: unlink it, overwrite key and
                // value, relink at the front under the new key.
                self.detach(ptr);
                let node = unsafe { &mut *ptr.as_ptr() };
                self.map.remove(&node.key);
                let old_key = mem::replace(&mut node.key, key);
                let old_value = mem::replace(&mut node.value, value);
                self.map.insert(node.key.clone(), ptr);
                self.attach_front(ptr);
                self.debug_validate();
                return Some((old_key, old_value));
            }
        }

        let node = Box::new(Entry {
            prev: None,
            next: None,
            key: key.clone(),
            value,
        });
        let ptr = NonNull::from(Box::leak(node));
        self.map.insert(key, ptr);
        self.attach_front(ptr);
        self.debug_validate();
        None
    }

    /// Removes `key`, returning its pair if it was present.
    pub(crate) fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let ptr = self.map.remove(key)?;
        self.detach(ptr);
        let node = unsafe { Box::from_raw(ptr.as_ptr()) };
        self.debug_validate();
        Some((node.key, node.value))
    }

    /// Drops every entry and resets the list to empty.
    pub(crate) fn clear(&mut self) {
        while self.pop_tail_node().is_some() {}
        self.map.clear();
        self.debug_validate();
    }

    /// Unlink a node from the list without touching the map.
    #[inline]
    fn detach(&mut self, ptr: NonNull<Entry<K, V>>) {
        unsafe {
            let node = ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }
            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Link a detached node at the MRU position.
    #[inline]
    fn attach_front(&mut self, mut ptr: NonNull<Entry<K, V>>) {
        unsafe {
            let node = ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(ptr),
                None => self.tail = Some(ptr),
            }
            self.head = Some(ptr);
        }
    }

    /// Unlink and take ownership of the tail node.
    fn pop_tail_node(&mut self) -> Option<Box<Entry<K, V>>> {
        self.tail.map(|ptr| unsafe {
            let node = Box::from_raw(ptr.as_ptr());
            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }
            node
        })
    }

    /// Verifies that the list and the map describe the same node set.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.map.is_empty() {
            if self.head.is_some() || self.tail.is_some() {
                return Err(InvariantError::new("empty map with non-empty list"));
            }
            return Ok(());
        }

        let mut count = 0usize;
        let mut expected_prev: Option<NonNull<Entry<K, V>>> = None;
        let mut current = self.head;
        while let Some(ptr) = current {
            count += 1;
            if count > self.map.len() {
                return Err(InvariantError::new("cycle detected in recency list"));
            }
            let node = unsafe { ptr.as_ref() };
            if node.prev != expected_prev {
                return Err(InvariantError::new("broken prev link in recency list"));
            }
            match self.map.get(&node.key) {
                Some(&mapped) if mapped == ptr => {}
                Some(_) => {
                    return Err(InvariantError::new("map points at a different node"));
                }
                None => {
                    return Err(InvariantError::new("list node missing from map"));
                }
            }
            if node.next.is_none() && self.tail != Some(ptr) {
                return Err(InvariantError::new("tail does not point at last node"));
            }
            expected_prev = Some(ptr);
            current = node.next;
        }
        if count != self.map.len() {
            return Err(InvariantError::new(format!(
                "list length {} != map length {}",
                count,
                self.map.len()
            )));
        }
        Ok(())
    }

    #[inline]
    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        if let Err(err) = self.check_invariants() {
            panic!("lru invariant violated: {err}");
        }
    }
}

impl<K, V> Drop for LruCore<K, V> {
    fn drop(&mut self) {
        let mut current = self.head.take();
        self.tail = None;
        while let Some(ptr) = current {
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            current = node.next;
        }
    }
}

/// Standalone single-shard LRU cache with exact recency tracking.
///
/// Not internally synchronized: all mutating operations take `&mut self`.
/// Callers that need concurrent access should use
/// [`ShardedLruCache`](crate::lru::ShardedLruCache) instead.
///
/// A capacity of 0 falls back to [`DEFAULT_CAPACITY`].
///
/// # Example
///
/// ```
/// use shardmap::lru::LruCache;
///
/// let mut cache = LruCache::new(3);
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.set("c", 3);
///
/// // Touch "a" so it is no longer the eviction candidate.
/// assert_eq!(cache.get(&"a"), Some(&1));
///
/// cache.set("d", 4); // evicts "b", the least recently used
/// assert!(!cache.contains(&"b"));
/// assert!(cache.contains(&"a"));
/// ```
pub struct LruCache<K, V> {
    core: LruCore<K, V>,
    on_evict: Option<Box<dyn FnMut(K, V) + Send>>,
    accesses: u64,
    hits: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of 0 is normalized to [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            core: LruCore::new(capacity),
            on_evict: None,
            accesses: 0,
            hits: 0,
        }
    }

    /// Creates a cache that reports every entry leaving it to `on_evict`.
    ///
    /// The callback fires for capacity evictions and explicit
    /// [`remove`](LruCache::remove) calls, but not for [`clear`](LruCache::clear).
    pub fn with_on_evict(capacity: usize, on_evict: impl FnMut(K, V) + Send + 'static) -> Self {
        let mut cache = Self::new(capacity);
        cache.on_evict = Some(Box::new(on_evict));
        cache
    }

    /// Replaces the eviction callback.
    pub fn set_on_evict(&mut self, on_evict: impl FnMut(K, V) + Send + 'static) {
        self.on_evict = Some(Box::new(on_evict));
    }

    /// Looks up `key`, marking the entry most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.accesses += 1;
        let value = self.core.get(key);
        if value.is_some() {
            self.hits += 1;
        }
        value
    }

    /// Looks up `key` without altering recency order or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.core.peek(key)
    }

    /// Inserts or updates `key`. The least recently used entry is evicted
    /// (and reported to the callback) when a new key overflows capacity.
    pub fn set(&mut self, key: K, value: V) {
        if let Some((evicted_key, evicted_value)) = self.core.set(key, value) {
            if let Some(on_evict) = self.on_evict.as_mut() {
                on_evict(evicted_key, evicted_value);
            }
        }
    }

    /// Removes `key`, reporting it to the eviction callback if present.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.core.remove(key) {
            Some((removed_key, removed_value)) => {
                if let Some(on_evict) = self.on_evict.as_mut() {
                    on_evict(removed_key, removed_value);
                }
                true
            }
            None => false,
        }
    }

    /// Returns whether `key` is present, without altering recency order.
    pub fn contains(&self, key: &K) -> bool {
        self.core.contains(key)
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Drops every entry and resets the hit/access counters. The eviction
    /// callback is not invoked.
    pub fn clear(&mut self) {
        self.core.clear();
        self.accesses = 0;
        self.hits = 0;
    }

    /// Total lookups since construction or the last clear.
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Lookups that found their key.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Fraction of lookups that hit, in `[0, 1]`; 0 when nothing has been
    /// looked up yet.
    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantError> {
        self.core.check_invariants()
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
