//! Trait seam over the concurrent map types.
//!
//! [`ConcurrentMap`] is the operation set shared by every thread-safe map in
//! this crate — [`ShardedLruCache`](crate::lru::ShardedLruCache),
//! [`ShardedMap`](crate::map::ShardedMap), and
//! [`TtlMap`](crate::map::TtlMap) — so callers can swap eviction behavior
//! behind one interface. Operations specific to a single type (recency
//! statistics, per-entry TTLs, iteration) stay inherent on that type.

use std::hash::Hash;

/// Shared-reference key-value operations common to all concurrent maps.
///
/// Lookups return owned clones: a reference into a shard would pin that
/// shard's lock for the borrow's lifetime.
///
/// # Example
///
/// ```
/// use shardmap::lru::ShardedLruCache;
/// use shardmap::map::ShardedMap;
/// use shardmap::traits::ConcurrentMap;
///
/// fn warm<M: ConcurrentMap<u64, u64>>(map: &M) {
///     for i in 0..16 {
///         map.set(i, i * i);
///     }
/// }
///
/// let cache = ShardedLruCache::new(4, 64);
/// let map = ShardedMap::new();
/// warm(&cache);
/// warm(&map);
/// assert_eq!(cache.get(&3), Some(9));
/// ```
pub trait ConcurrentMap<K, V> {
    /// Returns the value stored under `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Inserts or replaces the value stored under `key`.
    fn set(&self, key: K, value: V);

    /// Removes `key`, returning whether it was present.
    fn remove(&self, key: &K) -> bool;

    /// Number of stored entries (weakly consistent under concurrency).
    fn len(&self) -> usize;

    /// Returns `true` when the map holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    fn clear(&self);
}

impl<K, V, S> ConcurrentMap<K, V> for crate::lru::ShardedLruCache<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: std::hash::BuildHasher,
{
    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key)
    }

    fn set(&self, key: K, value: V) {
        Self::set(self, key, value)
    }

    fn remove(&self, key: &K) -> bool {
        Self::remove(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn clear(&self) {
        Self::clear(self)
    }
}

impl<K, V, S> ConcurrentMap<K, V> for crate::map::ShardedMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: std::hash::BuildHasher,
{
    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key)
    }

    fn set(&self, key: K, value: V) {
        Self::set(self, key, value)
    }

    fn remove(&self, key: &K) -> bool {
        Self::remove(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn clear(&self) {
        Self::clear(self)
    }
}

impl<K, V> ConcurrentMap<K, V> for crate::map::TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key)
    }

    fn set(&self, key: K, value: V) {
        Self::set(self, key, value)
    }

    fn remove(&self, key: &K) -> bool {
        Self::remove(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn clear(&self) {
        Self::clear(self)
    }
}
