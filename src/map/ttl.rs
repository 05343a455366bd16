//! TTL-expiring map layered on the plain sharded map.
//!
//! Every entry is stored as `(value, expiry)` inside a
//! [`ShardedMap`](crate::map::ShardedMap). Expiry is enforced twice over:
//!
//! - **Lazily**: [`TtlMap::get`] compares the stored expiry against the
//!   clock and deletes the entry on the spot when it has passed, so an
//!   expired key reads as missing even before any sweep runs.
//! - **Proactively**: a background janitor thread fires on a fixed interval
//!   and sweeps every shard with the map's two-phase
//!   [`retain`](crate::map::ShardedMap::retain), bounding memory growth from
//!   entries that are never read again.
//!
//! The janitor loops over a `crossbeam_channel` tick/stop `select!` and
//! holds only a `Weak` reference to the map state. Dropping the `TtlMap`
//! signals the stop channel and joins the thread, so shutdown is
//! deterministic; the `Weak` upgrade is merely a backstop should the state
//! outlive a stop signal.
//!
//! Time is read through an injectable [`Clock`], so tests advance a
//! [`ManualClock`](crate::clock::ManualClock) instead of sleeping.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Sender};

use crate::clock::Clock;
use crate::map::ShardedMap;

/// Fallback TTL applied by [`TtlMap::set`] when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Default janitor firing interval.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// A value plus the instant it stops being served.
#[derive(Debug, Clone)]
struct Expiring<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Expiring<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Shared state reachable from both the map handle and the janitor thread.
struct TtlInner<K, V> {
    map: ShardedMap<K, Expiring<V>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<K, V> TtlInner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn remove_expired(&self) {
        let now = self.clock.now();
        self.map.retain(|_, entry| !entry.is_expired(now));
    }
}

/// Expiring key-value map with lazy reads and a background sweep.
///
/// Constructed via [`TtlMap::new`] for the defaults (15 minute TTL, 60
/// second sweep, system clock) or [`TtlMap::builder`] to configure TTL,
/// sweep interval, shard count, and time source.
///
/// A per-entry TTL of [`Duration::ZERO`] means the entry never expires.
/// A cleanup interval of [`Duration::ZERO`] disables the janitor entirely,
/// leaving lazy expiry as the only enforcement.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use shardmap::clock::{Clock, ManualClock};
/// use shardmap::map::TtlMap;
///
/// let clock = Arc::new(ManualClock::new());
/// let map = TtlMap::builder()
///     .default_ttl(Duration::from_secs(30))
///     .cleanup_interval(Duration::ZERO) // lazy expiry only
///     .clock(Arc::clone(&clock) as Arc<dyn Clock>)
///     .build();
///
/// map.set("token", 42u32);
/// assert_eq!(map.get(&"token"), Some(42));
///
/// clock.advance(Duration::from_secs(31));
/// assert_eq!(map.get(&"token"), None);
/// assert_eq!(map.len(), 0);
/// ```
pub struct TtlMap<K, V> {
    inner: Arc<TtlInner<K, V>>,
    janitor: Option<Janitor>,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a map with the default TTL, sweep interval, shard count, and
    /// the system clock.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts a builder over every construction-time knob.
    pub fn builder() -> crate::builder::TtlMapBuilder<K, V> {
        crate::builder::TtlMapBuilder::new()
    }

    pub(crate) fn with_parts(
        shard_count: usize,
        default_ttl: Duration,
        cleanup_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inner = Arc::new(TtlInner {
            map: ShardedMap::with_shard_count(shard_count),
            clock,
            default_ttl,
        });
        let janitor = if cleanup_interval.is_zero() {
            None
        } else {
            Some(Janitor::spawn(Arc::downgrade(&inner), cleanup_interval))
        };
        Self { inner, janitor }
    }
}

impl<K, V> Default for TtlMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Stores `value` under `key` with the map's default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.inner.default_ttl);
    }

    /// Stores `value` under `key`, expiring `ttl` from now.
    ///
    /// A `ttl` of [`Duration::ZERO`] pins the entry: it never expires and is
    /// only removed explicitly.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(self.inner.clock.now() + ttl)
        };
        self.inner.map.set(key, Expiring { value, expires_at });
    }

    /// Returns the live value under `key`.
    ///
    /// An expired entry is deleted on the spot and reported as missing,
    /// independent of the background sweep.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let entry = self.inner.map.get(key)?;
        let now = self.inner.clock.now();
        if entry.is_expired(now) {
            // Delete only if the stored entry is still expired, so a
            // concurrent refresh is not thrown away.
            self.inner.map.remove_if(key, |current| current.is_expired(now));
            return None;
        }
        Some(entry.value)
    }

    /// Removes `key`, returning whether it was present (expired or not).
    pub fn remove(&self, key: &K) -> bool {
        self.inner.map.remove(key)
    }

    /// Number of stored entries, including entries that have expired but
    /// not yet been swept. Weakly consistent.
    pub fn len(&self) -> usize {
        self.inner.map.len()
    }

    /// Returns `true` when the map holds no entries (weakly consistent).
    pub fn is_empty(&self) -> bool {
        self.inner.map.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.map.clear();
    }

    /// Sweeps every shard now, deleting entries whose expiry has passed.
    ///
    /// The same pass the janitor runs on its interval; callers can invoke it
    /// directly instead of waiting for the next tick.
    pub fn remove_expired(&self) {
        self.inner.remove_expired();
    }

    /// The TTL applied by [`set`](TtlMap::set).
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Whether a janitor thread is running for this map.
    pub fn has_janitor(&self) -> bool {
        self.janitor.is_some()
    }
}

impl<K, V> std::fmt::Debug for TtlMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlMap")
            .field("len", &self.len())
            .field("default_ttl", &self.inner.default_ttl)
            .field("janitor", &self.janitor.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to the background sweep thread.
///
/// Dropping it signals the stop channel and joins the thread.
struct Janitor {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Janitor {
    fn spawn<K, V>(inner: Weak<TtlInner<K, V>>, interval: Duration) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let (stop, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);
        let handle = std::thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    // The map handle may already be gone; exit instead of
                    // keeping the state alive forever.
                    let Some(inner) = inner.upgrade() else { return };
                    inner.remove_expired();
                }
                recv(stop_rx) -> _ => return,
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn lazy_map<K, V>(default_ttl: Duration) -> (TtlMap<K, V>, Arc<ManualClock>)
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let clock = Arc::new(ManualClock::new());
        let map = TtlMap::builder()
            .shard_count(4)
            .default_ttl(default_ttl)
            .cleanup_interval(Duration::ZERO)
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .build();
        (map, clock)
    }

    #[test]
    fn get_before_expiry_returns_the_value() {
        let (map, _clock) = lazy_map::<u32, &str>(Duration::from_secs(10));
        map.set(1, "one");
        assert_eq!(map.get(&1), Some("one"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn expired_entry_reads_as_missing_and_is_deleted() {
        let (map, clock) = lazy_map::<u32, &str>(Duration::from_secs(10));
        map.set(1, "one");
        clock.advance(Duration::from_secs(11));
        assert_eq!(map.get(&1), None);
        assert_eq!(map.len(), 0, "lazy expiry must delete the entry");
    }

    #[test]
    fn explicit_ttl_overrides_the_default() {
        let (map, clock) = lazy_map::<u32, &str>(Duration::from_secs(1000));
        map.set_with_ttl(1, "short", Duration::from_millis(50));
        clock.advance(Duration::from_millis(100));
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn zero_ttl_pins_an_entry_forever() {
        let (map, clock) = lazy_map::<u32, &str>(Duration::from_secs(1));
        map.set_with_ttl(1, "pinned", Duration::ZERO);
        clock.advance(Duration::from_secs(1_000_000));
        assert_eq!(map.get(&1), Some("pinned"));
        map.remove_expired();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn entry_is_live_at_its_exact_deadline() {
        let (map, clock) = lazy_map::<u32, &str>(Duration::from_secs(10));
        map.set(1, "one");
        clock.advance(Duration::from_secs(10));
        // Expiry requires the clock to move strictly past the deadline.
        assert_eq!(map.get(&1), Some("one"));
        clock.advance(Duration::from_nanos(1));
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn remove_expired_sweeps_without_reads() {
        let (map, clock) = lazy_map::<u32, u32>(Duration::from_secs(5));
        for i in 0..50 {
            map.set(i, i);
        }
        map.set_with_ttl(100, 100, Duration::from_secs(3600));
        clock.advance(Duration::from_secs(6));
        map.remove_expired();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&100), Some(100));
    }

    #[test]
    fn overwriting_refreshes_the_deadline() {
        let (map, clock) = lazy_map::<u32, &str>(Duration::from_secs(10));
        map.set(1, "first");
        clock.advance(Duration::from_secs(8));
        map.set(1, "second");
        clock.advance(Duration::from_secs(8));
        assert_eq!(map.get(&1), Some("second"));
    }

    #[test]
    fn remove_reports_presence_even_when_expired() {
        let (map, clock) = lazy_map::<u32, &str>(Duration::from_secs(1));
        map.set(1, "one");
        clock.advance(Duration::from_secs(2));
        assert!(map.remove(&1));
        assert!(!map.remove(&1));
    }

    #[test]
    fn clear_empties_the_map() {
        let (map, _clock) = lazy_map::<u32, u32>(Duration::from_secs(10));
        for i in 0..20 {
            map.set(i, i);
        }
        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn zero_cleanup_interval_disables_the_janitor() {
        let (map, _clock) = lazy_map::<u32, u32>(Duration::from_secs(1));
        assert!(!map.has_janitor());

        let with_janitor: TtlMap<u32, u32> = TtlMap::builder()
            .cleanup_interval(Duration::from_secs(60))
            .build();
        assert!(with_janitor.has_janitor());
    }

    #[test]
    fn default_constructor_uses_documented_fallbacks() {
        let map: TtlMap<u32, u32> = TtlMap::new();
        assert_eq!(map.default_ttl(), DEFAULT_TTL);
        assert!(map.has_janitor());
    }
}
