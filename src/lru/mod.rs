//! LRU caches: a single-shard core and the sharded concurrent map built on it.
//!
//! [`LruCache`] is the standalone single-shard cache (`&mut self`, no
//! locking). [`ShardedLruCache`] distributes keys over independently locked
//! shards for concurrent callers; see its module docs for the locking
//! discipline.

pub mod cache;
pub mod sharded;

use std::sync::Arc;

pub use cache::LruCache;
pub use sharded::{CacheStats, ShardedLruCache};

pub(crate) use cache::LruCore;

/// Fallback capacity used when a cache is constructed with capacity 0.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Callback invoked with each entry that leaves a cache.
///
/// Shared across shards and worker threads, hence `Arc` + `Send + Sync`.
/// Always invoked outside any shard lock, so the callback may safely call
/// back into the cache.
pub type EvictionCallback<K, V> = Arc<dyn Fn(K, V) + Send + Sync>;
