//! Sharded concurrent LRU cache.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                     ShardedLruCache<K, V>                         │
//!   │                                                                   │
//!   │   key ──► ShardSelector (seeded hash + avalanche mix + mask)      │
//!   │                │                                                  │
//!   │                ▼                                                  │
//!   │   ┌───────────┬───────────┬───────────┬───────────┐              │
//!   │   │  Shard 0  │  Shard 1  │  Shard 2  │  Shard 3  │  (2^n shards)│
//!   │   │ RwLock<   │ RwLock<   │ RwLock<   │ RwLock<   │              │
//!   │   │  LruCore> │  LruCore> │  LruCore> │  LruCore> │              │
//!   │   │ accesses  │ accesses  │ accesses  │ accesses  │  (atomics)   │
//!   │   │ hits      │ hits      │ hits      │ hits      │              │
//!   │   └───────────┴───────────┴───────────┴───────────┘              │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation hashes its key to exactly one shard and runs entirely
//! under that shard's lock; no operation ever holds two shard locks, so
//! there is no cross-shard deadlock. Whole-map operations (`len`, `clear`,
//! `stats`) visit shards one at a time, each under its own briefly-held
//! lock — they are deliberately weakly consistent, not atomic snapshots.
//!
//! ## Locking discipline
//!
//! | Operation  | Lock                      | Notes                          |
//! |------------|---------------------------|--------------------------------|
//! | `get`      | upgradable read → write   | miss never takes the write lock|
//! | `contains` | read                      | never alters recency           |
//! | `set`      | write                     | eviction callback after unlock |
//! | `remove`   | write                     | eviction callback after unlock |
//! | `len`      | read, per shard           | weakly consistent              |
//! | `clear`    | write, per shard          | not atomic across shards       |
//! | `stats`    | read, per shard           | weakly consistent              |
//!
//! `get` must update recency, so a hit needs exclusive access. The guard is
//! taken as an upgradable read first: misses return without ever blocking
//! readers, and on a hit the upgrade is atomic — no writer can slip in
//! between the existence check and the list splice, which is what makes the
//! check-then-splice sequence sound without a second lookup.
//!
//! Hit/access counters are relaxed atomics bumped outside the shard lock;
//! they feed [`CacheStats`] and tolerate the usual weak-consistency slack of
//! a statistics API.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::ds::shard::default_shard_count;
use crate::ds::ShardSelector;
use crate::lru::{EvictionCallback, LruCore, DEFAULT_CAPACITY};

/// Shard-count multiplier applied to available parallelism by default.
const DEFAULT_SHARD_FACTOR: usize = 4;

/// One LRU partition: the core under its lock, counters beside it.
struct Shard<K, V> {
    core: RwLock<LruCore<K, V>>,
    accesses: AtomicU64,
    hits: AtomicU64,
}

/// Point-in-time statistics for a [`ShardedLruCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Fraction of lookups that hit, in `[0, 1]`; 0 when no lookups have
    /// happened yet.
    pub hit_rate: f64,
    /// Per-shard fill fraction (`len / capacity`), in shard-index order.
    /// Uneven values indicate hash skew.
    pub shard_load: Vec<f64>,
}

/// Concurrent LRU cache sharded over independently locked partitions.
///
/// Construction normalizes its inputs instead of rejecting them: a shard
/// count of 0 falls back to four shards per available core, any other count
/// is rounded up to the next power of two, a capacity of 0 falls back to
/// [`DEFAULT_CAPACITY`], and every shard receives at least one slot. The
/// effective total capacity is therefore
/// `max(capacity / shard_count, 1) * shard_count`.
///
/// # Example
///
/// ```
/// use shardmap::lru::ShardedLruCache;
///
/// let cache = ShardedLruCache::new(4, 1024);
/// cache.set("session:1", 17u64);
/// assert_eq!(cache.get(&"session:1"), Some(17));
/// assert_eq!(cache.get(&"session:2"), None);
///
/// let stats = cache.stats();
/// assert_eq!(stats.hit_rate, 0.5);
/// ```
pub struct ShardedLruCache<K, V, S = RandomState> {
    shards: Box<[Shard<K, V>]>,
    selector: ShardSelector<S>,
    per_shard_capacity: usize,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> ShardedLruCache<K, V, RandomState>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache with `shard_count` shards sharing `capacity` slots.
    ///
    /// Both parameters are normalized as described on the type.
    pub fn new(shard_count: usize, capacity: usize) -> Self {
        Self::with_parts(shard_count, capacity, None, RandomState::new())
    }

    /// Starts a builder for callers that need an eviction callback or a
    /// deterministic hasher.
    pub fn builder() -> crate::builder::ShardedLruBuilder<K, V, RandomState> {
        crate::builder::ShardedLruBuilder::new()
    }
}

impl<K, V, S> ShardedLruCache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub(crate) fn with_parts(
        shard_count: usize,
        capacity: usize,
        on_evict: Option<EvictionCallback<K, V>>,
        hasher: S,
    ) -> Self {
        let shard_count = if shard_count == 0 {
            default_shard_count(DEFAULT_SHARD_FACTOR)
        } else {
            shard_count
        };
        let selector = ShardSelector::with_hasher(shard_count, hasher);
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        let per_shard_capacity = (capacity / selector.shard_count()).max(1);

        let shards = (0..selector.shard_count())
            .map(|_| Shard {
                core: RwLock::new(LruCore::new(per_shard_capacity)),
                accesses: AtomicU64::new(0),
                hits: AtomicU64::new(0),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            selector,
            per_shard_capacity,
            on_evict,
        }
    }

    #[inline]
    fn shard_for(&self, key: &K) -> &Shard<K, V> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    /// Looks up `key`, marking the entry most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let shard = self.shard_for(key);
        shard.accesses.fetch_add(1, Ordering::Relaxed);

        let core = shard.core.upgradable_read();
        if !core.contains(key) {
            return None;
        }
        // The upgrade is atomic: no writer can remove the entry between the
        // check above and the splice below.
        let mut core = RwLockUpgradableReadGuard::upgrade(core);
        let value = core.get(key).cloned();
        if value.is_some() {
            shard.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Inserts or updates `key`. When a new key overflows its shard, the
    /// shard's least recently used entry is evicted and reported to the
    /// eviction callback (after the shard lock is released).
    pub fn set(&self, key: K, value: V) {
        let shard = self.shard_for(&key);
        let evicted = shard.core.write().set(key, value);
        if let Some((evicted_key, evicted_value)) = evicted {
            if let Some(on_evict) = &self.on_evict {
                on_evict(evicted_key, evicted_value);
            }
        }
    }

    /// Removes `key`, reporting it to the eviction callback. Returns whether
    /// anything was removed.
    pub fn remove(&self, key: &K) -> bool {
        let shard = self.shard_for(key);
        let removed = shard.core.write().remove(key);
        match removed {
            Some((removed_key, removed_value)) => {
                if let Some(on_evict) = &self.on_evict {
                    on_evict(removed_key, removed_value);
                }
                true
            }
            None => false,
        }
    }

    /// Returns whether `key` is present, without altering recency order or
    /// hit/access counters.
    pub fn contains(&self, key: &K) -> bool {
        self.shard_for(key).core.read().contains(key)
    }

    /// Total entries across all shards. Weakly consistent: concurrent
    /// mutation on other shards may race with the sum.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.core.read().len())
            .sum()
    }

    /// Returns `true` when no shard holds an entry (weakly consistent).
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.core.read().len() == 0)
    }

    /// Clears every shard and resets the hit/access counters.
    ///
    /// Shards are cleared one at a time; a concurrent reader may briefly
    /// observe some shards empty and others still populated. The eviction
    /// callback is not invoked.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.core.write().clear();
            shard.accesses.store(0, Ordering::Relaxed);
            shard.hits.store(0, Ordering::Relaxed);
        }
    }

    /// Number of shards (always a power of two).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Effective total capacity (`per-shard capacity * shard count`).
    pub fn capacity(&self) -> usize {
        self.per_shard_capacity * self.shards.len()
    }

    /// Aggregates hit rate and per-shard load factors.
    ///
    /// Weakly consistent like [`len`](ShardedLruCache::len): counters and
    /// sizes are read shard by shard while other threads keep mutating.
    pub fn stats(&self) -> CacheStats {
        let mut accesses = 0u64;
        let mut hits = 0u64;
        let mut shard_load = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            accesses += shard.accesses.load(Ordering::Relaxed);
            hits += shard.hits.load(Ordering::Relaxed);
            let len = shard.core.read().len();
            shard_load.push(len as f64 / self.per_shard_capacity as f64);
        }
        let hit_rate = if accesses == 0 {
            0.0
        } else {
            hits as f64 / accesses as f64
        };
        CacheStats {
            hit_rate,
            shard_load,
        }
    }
}

impl<K, V, S> std::fmt::Debug for ShardedLruCache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedLruCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
