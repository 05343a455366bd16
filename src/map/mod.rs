//! Concurrency-safe maps without eviction: the plain sharded map and the
//! TTL-expiring map layered on top of it.

pub mod sharded;
pub mod ttl;

pub use sharded::{Iter, ShardedMap};
pub use ttl::TtlMap;
