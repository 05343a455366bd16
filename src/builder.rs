//! Builders for the configurable map types.
//!
//! Construction-time knobs (shard count, capacity, eviction callback, TTLs,
//! time source, hash state) are collected on a builder and applied in one
//! `build()` call. Every knob has a documented default and out-of-range
//! values are normalized, never rejected.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use shardmap::lru::ShardedLruCache;
//! use shardmap::map::TtlMap;
//!
//! let cache = ShardedLruCache::builder()
//!     .shard_count(8)
//!     .capacity(10_000)
//!     .on_evict(|key: u64, _value: String| println!("evicted {key}"))
//!     .build();
//! cache.set(1, "one".to_string());
//!
//! let sessions: TtlMap<u64, String> = TtlMap::builder()
//!     .default_ttl(Duration::from_secs(300))
//!     .cleanup_interval(Duration::from_secs(5))
//!     .build();
//! sessions.set(1, "session".to_string());
//! ```

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::lru::{EvictionCallback, ShardedLruCache};
use crate::map::ttl::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL};
use crate::map::TtlMap;

/// Builder for [`ShardedLruCache`].
///
/// Defaults: shard count 0 (four shards per available core), capacity 0
/// ([`DEFAULT_CAPACITY`](crate::lru::DEFAULT_CAPACITY)), no eviction
/// callback, freshly seeded hash state.
pub struct ShardedLruBuilder<K, V, S = RandomState> {
    shard_count: usize,
    capacity: usize,
    on_evict: Option<EvictionCallback<K, V>>,
    hasher: S,
}

impl<K, V> ShardedLruBuilder<K, V, RandomState> {
    /// Starts a builder with every knob at its default.
    pub fn new() -> Self {
        Self {
            shard_count: 0,
            capacity: 0,
            on_evict: None,
            hasher: RandomState::new(),
        }
    }
}

impl<K, V> Default for ShardedLruBuilder<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ShardedLruBuilder<K, V, S> {
    /// Number of shards; 0 means the default, anything else is rounded up
    /// to the next power of two.
    pub fn shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// Total capacity divided across shards (each shard gets at least one
    /// slot); 0 means the default.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Callback invoked, outside any shard lock, with every entry leaving
    /// the cache through capacity eviction or [`remove`](ShardedLruCache::remove).
    pub fn on_evict(mut self, on_evict: impl Fn(K, V) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Arc::new(on_evict));
        self
    }

    /// Replaces the shard-selection hash state. Intended for deterministic
    /// tests; the default state is randomly seeded per instance.
    pub fn hasher<S2: BuildHasher>(self, hasher: S2) -> ShardedLruBuilder<K, V, S2> {
        ShardedLruBuilder {
            shard_count: self.shard_count,
            capacity: self.capacity,
            on_evict: self.on_evict,
            hasher,
        }
    }

    /// Builds the cache.
    pub fn build(self) -> ShardedLruCache<K, V, S>
    where
        K: Eq + Hash + Clone,
        S: BuildHasher,
    {
        ShardedLruCache::with_parts(self.shard_count, self.capacity, self.on_evict, self.hasher)
    }
}

/// Builder for [`TtlMap`].
///
/// Defaults: shard count 0 (sixteen shards per available core), default TTL
/// [`DEFAULT_TTL`], cleanup interval [`DEFAULT_CLEANUP_INTERVAL`], system
/// clock.
pub struct TtlMapBuilder<K, V> {
    shard_count: usize,
    default_ttl: Duration,
    cleanup_interval: Duration,
    clock: Arc<dyn Clock>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> TtlMapBuilder<K, V> {
    /// Starts a builder with every knob at its default.
    pub fn new() -> Self {
        Self {
            shard_count: 0,
            default_ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            clock: Arc::new(SystemClock),
            _marker: PhantomData,
        }
    }

    /// Number of shards in the backing map; 0 means the default.
    pub fn shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// TTL applied by [`TtlMap::set`]. [`Duration::ZERO`] makes plain `set`
    /// store entries that never expire.
    pub fn default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Janitor firing interval. [`Duration::ZERO`] disables the background
    /// sweep, leaving lazy expiry as the only enforcement.
    pub fn cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    /// Replaces the time source. Intended for deterministic tests via
    /// [`ManualClock`](crate::clock::ManualClock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the map, spawning the janitor thread unless the cleanup
    /// interval is zero.
    pub fn build(self) -> TtlMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        TtlMap::with_parts(
            self.shard_count,
            self.default_ttl,
            self.cleanup_interval,
            self.clock,
        )
    }
}

impl<K, V> Default for TtlMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
