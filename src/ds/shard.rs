//! Shared sharding helpers for consistent shard selection.
//!
//! Provides the deterministic key-to-shard mapping used by
//! [`ShardedLruCache`](crate::lru::ShardedLruCache) and
//! [`ShardedMap`](crate::map::ShardedMap).
//!
//! ```text
//!   key ──► keyed 64-bit hash ──► avalanche mix ──► & (shards - 1) ──► index
//! ```
//!
//! The shard count is rounded up to a power of two so selection is a single
//! mask instead of a modulo. The hash is keyed by a per-instance random state
//! (unpredictable to callers), then finalized with an xor-shift/multiply
//! avalanche step so weak low bits in the key's `Hash` impl still spread
//! across all shards.
//!
//! Properties:
//! - Deterministic: the same key on the same selector always lands on the
//!   same shard.
//! - Seed isolation: two selectors built with [`ShardSelector::new`] hash the
//!   same key to unrelated shards.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

/// Fallback shard count when `available_parallelism` is unavailable.
const MIN_PARALLELISM: usize = 1;

/// Returns `available_parallelism * factor`, before power-of-two rounding.
pub(crate) fn default_shard_count(factor: usize) -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_PARALLELISM)
        * factor
}

/// Finalizing avalanche mix (Murmur3 fmix64 variant).
///
/// Spreads entropy into the low bits consumed by the shard mask.
#[inline]
fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h
}

/// Deterministic shard selector over a seeded 64-bit hash.
///
/// Maps any `Hash`able key to an index in `[0, shard_count)`. The shard
/// count passed to the constructor is clamped to at least 1 and rounded up
/// to the next power of two.
///
/// # Example
///
/// ```
/// use shardmap::ds::ShardSelector;
///
/// let selector = ShardSelector::new(6); // rounds up to 8 shards
/// assert_eq!(selector.shard_count(), 8);
///
/// let shard = selector.shard_for_key(&"user:123");
/// assert!(shard < 8);
/// assert_eq!(selector.shard_for_key(&"user:123"), shard);
/// ```
#[derive(Debug)]
pub struct ShardSelector<S = RandomState> {
    shards: usize,
    mask: usize,
    hasher: S,
}

impl ShardSelector<RandomState> {
    /// Creates a selector with a freshly seeded hash state.
    ///
    /// The seed is generated internally so the key-to-shard mapping is not
    /// predictable across instances.
    pub fn new(shards: usize) -> Self {
        Self::with_hasher(shards, RandomState::new())
    }
}

impl<S: BuildHasher> ShardSelector<S> {
    /// Creates a selector using a caller-supplied hash state.
    ///
    /// Intended for deterministic tests; production callers should prefer
    /// [`ShardSelector::new`].
    pub fn with_hasher(shards: usize, hasher: S) -> Self {
        let shards = shards.max(1).next_power_of_two();
        Self {
            shards,
            mask: shards - 1,
            hasher,
        }
    }

    /// Returns the number of shards (always a power of two).
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Maps a key to a shard index in `[0, shard_count)`.
    ///
    /// Pure function of the selector's seed and the key: no hidden mutable
    /// state, so repeated calls for the same key always return the same
    /// index.
    #[inline]
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        (mix64(self.hasher.hash_one(key)) as usize) & self.mask
    }
}
