pub use crate::builder::{ShardedLruBuilder, TtlMapBuilder};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::ds::ShardSelector;
pub use crate::lru::{CacheStats, LruCache, ShardedLruCache};
pub use crate::map::{ShardedMap, TtlMap};
pub use crate::traits::ConcurrentMap;
