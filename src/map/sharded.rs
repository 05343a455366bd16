//! Plain sharded map: concurrent hash map without ordering or eviction.
//!
//! Keys are distributed over a power-of-two number of independently locked
//! hash maps by the same seeded selector the LRU cache uses. Reads take the
//! owning shard's read lock, mutations its write lock; no operation holds
//! two shard locks, and whole-map operations (`len`, `clear`, `iter`,
//! `retain`) visit shards one at a time.
//!
//! Iteration never holds a lock while the caller runs: each shard's contents
//! are snapshotted under a briefly-held read lock, the lock is released, and
//! only then are pairs yielded. The iterator therefore reflects a
//! moment-in-time view per shard rather than one global snapshot, and a
//! caller may freely call back into the map mid-iteration.
//!
//! Besides standalone use, this map is the storage layer for
//! [`TtlMap`](crate::map::TtlMap).

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ds::shard::default_shard_count;
use crate::ds::ShardSelector;

/// Shard-count multiplier applied to available parallelism by default.
const DEFAULT_SHARD_FACTOR: usize = 16;

/// Concurrent unordered map sharded over independently locked partitions.
///
/// A shard count of 0 falls back to sixteen shards per available core; any
/// other count is rounded up to the next power of two. There is no capacity
/// bound.
///
/// # Example
///
/// ```
/// use shardmap::map::ShardedMap;
///
/// let map = ShardedMap::with_shard_count(8);
/// map.set("alpha", 1);
/// map.set("beta", 2);
///
/// assert_eq!(map.get(&"alpha"), Some(1));
/// assert!(map.remove(&"beta"));
/// assert_eq!(map.len(), 1);
/// ```
pub struct ShardedMap<K, V, S = RandomState> {
    shards: Box<[RwLock<FxHashMap<K, V>>]>,
    selector: ShardSelector<S>,
}

impl<K, V> ShardedMap<K, V, RandomState>
where
    K: Eq + Hash,
{
    /// Creates a map with the default shard count (sixteen per available
    /// core, rounded up to a power of two).
    pub fn new() -> Self {
        Self::with_shard_count(0)
    }

    /// Creates a map with `shard_count` shards (0 means the default).
    pub fn with_shard_count(shard_count: usize) -> Self {
        Self::with_hasher(shard_count, RandomState::new())
    }
}

impl<K, V> Default for ShardedMap<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ShardedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Creates a map using a caller-supplied hash state for shard selection.
    pub fn with_hasher(shard_count: usize, hasher: S) -> Self {
        let shard_count = if shard_count == 0 {
            default_shard_count(DEFAULT_SHARD_FACTOR)
        } else {
            shard_count
        };
        let selector = ShardSelector::with_hasher(shard_count, hasher);
        let shards = (0..selector.shard_count())
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { shards, selector }
    }

    #[inline]
    fn shard_for(&self, key: &K) -> &RwLock<FxHashMap<K, V>> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard_for(key).read().get(key).cloned()
    }

    /// Inserts or replaces the value stored under `key`.
    pub fn set(&self, key: K, value: V) {
        self.shard_for(&key).write().insert(key, value);
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.shard_for(key).write().remove(key).is_some()
    }

    /// Removes `key` only if `pred` approves the stored value, under the
    /// shard's write lock. Returns whether the entry was removed.
    ///
    /// Lets callers delete conditionally without a read-check/write-delete
    /// race: the predicate sees the value that is actually removed.
    pub fn remove_if(&self, key: &K, pred: impl FnOnce(&V) -> bool) -> bool {
        let mut shard = self.shard_for(key).write();
        let doomed = shard.get(key).map_or(false, |value| pred(value));
        if doomed {
            shard.remove(key);
        }
        doomed
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.shard_for(key).read().contains_key(key)
    }

    /// Total entries across all shards. Weakly consistent.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Returns `true` when no shard holds an entry (weakly consistent).
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Clears every shard, one write lock at a time. Not atomic across
    /// shards as a whole.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    /// Number of shards (always a power of two).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Iterates over `(key, value)` clones, shard by shard.
    ///
    /// Each shard is snapshotted under its read lock and the lock released
    /// before any pair is yielded, so the loop body may call back into the
    /// map without deadlocking. See the module docs for the consistency
    /// model.
    pub fn iter(&self) -> Iter<'_, K, V>
    where
        K: Clone,
        V: Clone,
    {
        Iter {
            shards: self.shards.iter(),
            current: Vec::new().into_iter(),
        }
    }

    /// Removes every entry the predicate rejects.
    ///
    /// Two-phase per shard: doomed keys are collected under the read lock,
    /// then deleted under the write lock with the predicate re-checked, so
    /// an entry refreshed between the phases survives. The write lock is
    /// never held for the full shard scan.
    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool)
    where
        K: Clone,
    {
        for shard in self.shards.iter() {
            let doomed: Vec<K> = {
                let guard = shard.read();
                guard
                    .iter()
                    .filter(|&(key, value)| !keep(key, value))
                    .map(|(key, _)| key.clone())
                    .collect()
            };
            if doomed.is_empty() {
                continue;
            }
            let mut guard = shard.write();
            for key in doomed {
                if let Some(value) = guard.get(&key) {
                    if !keep(&key, value) {
                        guard.remove(&key);
                    }
                }
            }
        }
    }
}

impl<K, V, S> std::fmt::Debug for ShardedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedMap")
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Lazy iterator over per-shard snapshots of a [`ShardedMap`].
///
/// Created by [`ShardedMap::iter`]; each call produces a fresh, restartable
/// iteration.
pub struct Iter<'a, K, V> {
    shards: std::slice::Iter<'a, RwLock<FxHashMap<K, V>>>,
    current: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for Iter<'_, K, V>
where
    K: Clone,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(pair) = self.current.next() {
                return Some(pair);
            }
            let shard = self.shards.next()?;
            let snapshot: Vec<(K, V)> = {
                let guard = shard.read();
                guard
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            };
            self.current = snapshot.into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn round_trip_and_overwrite() {
        let map = ShardedMap::with_shard_count(4);
        map.set(1u64, "one");
        assert_eq!(map.get(&1), Some("one"));
        map.set(1, "uno");
        assert_eq!(map.get(&1), Some("uno"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let map = ShardedMap::with_shard_count(4);
        map.set(1u64, 1u64);
        assert!(map.remove(&1));
        assert!(!map.remove(&1));
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn remove_if_consults_the_stored_value() {
        let map = ShardedMap::with_shard_count(4);
        map.set("k", 10);
        assert!(!map.remove_if(&"k", |&v| v > 100));
        assert!(map.contains(&"k"));
        assert!(map.remove_if(&"k", |&v| v == 10));
        assert!(!map.contains(&"k"));
        assert!(!map.remove_if(&"k", |_| true));
    }

    #[test]
    fn default_shard_count_is_power_of_two() {
        let map: ShardedMap<u64, u64> = ShardedMap::new();
        assert!(map.shard_count().is_power_of_two());

        let map: ShardedMap<u64, u64> = ShardedMap::with_shard_count(5);
        assert_eq!(map.shard_count(), 8);
    }

    #[test]
    fn clear_empties_every_shard() {
        let map = ShardedMap::with_shard_count(8);
        for i in 0..256u64 {
            map.set(i, i);
        }
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn iter_yields_every_live_pair_exactly_once() {
        let map = ShardedMap::with_shard_count(8);
        for i in 0..100u64 {
            map.set(i, i * 10);
        }
        let collected: HashMap<u64, u64> = map.iter().collect();
        assert_eq!(collected.len(), 100);
        for i in 0..100u64 {
            assert_eq!(collected.get(&i), Some(&(i * 10)));
        }
    }

    #[test]
    fn iter_is_restartable_per_call() {
        let map = ShardedMap::with_shard_count(4);
        map.set(1u64, 1u64);
        assert_eq!(map.iter().count(), 1);
        assert_eq!(map.iter().count(), 1);
    }

    #[test]
    fn caller_may_mutate_the_map_while_iterating() {
        let map = ShardedMap::with_shard_count(4);
        for i in 0..32u64 {
            map.set(i, i);
        }
        // Writing back into the map mid-iteration must not deadlock.
        for (key, value) in map.iter() {
            map.set(key, value + 1);
        }
        assert_eq!(map.len(), 32);
        assert_eq!(map.get(&0), Some(1));
    }

    #[test]
    fn retain_keeps_only_approved_entries() {
        let map = ShardedMap::with_shard_count(8);
        for i in 0..100u64 {
            map.set(i, i);
        }
        map.retain(|_, &v| v % 2 == 0);
        assert_eq!(map.len(), 50);
        assert!(map.contains(&2));
        assert!(!map.contains(&3));
    }
}
