//! Expiring single-flight cache.
//!
//! [`Cache`] maps keys to values produced by a [`Loader`], serves them for a
//! freshness window, keeps serving them while a background refresh runs until
//! a hard expiry window, and collapses concurrent misses on one key into a
//! single loader call.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                           Cache<K, V, E> Layout                             │
//! │                                                                             │
//! │   entries: RwLock<FxHashMap<K, Entry<V>>>      resident values + load time  │
//! │   policy:  Mutex<Box<dyn EvictionPolicy<K>>>   residency order, victims     │
//! │   flights: Mutex<FxHashMap<K, Arc<Flight>>>    one in-flight load per key   │
//! │                                                                             │
//! │   lock order: entries → policy        flights is never held with either     │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! get(key)
//! ────────
//!
//!   age < freshness            → return value                  (read lock only)
//!   freshness ≤ age < expiry   → return value, first caller of the window
//!                                spawns one background refresh
//!   absent or age ≥ expiry     → lead or join the key's flight
//!                                 leader: drop expired entry, load, install,
//!                                         publish result to waiters
//!                                 waiter: block, receive leader's result
//! ```
//!
//! ## Guarantees
//!
//! - The loader runs at most once per key per miss, however many callers miss
//!   together. Every caller of that miss gets the same `Ok` or `Err`.
//! - Errors are never cached; the next `get` after a failed load loads again.
//! - Resident key count never exceeds capacity. Keys are admitted to the
//!   eviction policy only once their load succeeded, so an in-flight load can
//!   never be chosen as a victim.
//! - Values leaving the cache (eviction, expiry, replacement, invalidation,
//!   drop) go through the release hook exactly once, after they were removed
//!   from the map and with no cache lock held. Release failures are logged.
//! - A panicking loader wakes its waiters, who retry; the panic continues on
//!   the leader's thread.
//!
//! ## Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use flightcache::builder::CacheBuilder;
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&calls);
//! let cache = CacheBuilder::new(16)
//!     .build(move |key: &String| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok::<_, String>(key.len())
//!     })
//!     .unwrap();
//!
//! assert_eq!(cache.get(&"hello".to_string()), Ok(5));
//! assert_eq!(cache.get(&"hello".to_string()), Ok(5));
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! ```

mod entry;
mod flight;

use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::builder::CacheConfig;
use crate::clock::Clock;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::traits::{EvictionPolicy, Loader, ReleaseError};

use entry::{Entry, Freshness, Removal};
use flight::{Flight, FlightRole};

pub use entry::EntryState;

/// Hook run on every value that leaves a cache.
pub type ReleaseHook<V> = Arc<dyn Fn(&V) -> Result<(), ReleaseError> + Send + Sync>;

/// Concurrency-safe, capacity-bounded, time-expiring single-flight cache.
///
/// Built with [`CacheBuilder`](crate::builder::CacheBuilder). Share one
/// instance between threads by reference or behind an `Arc`.
pub struct Cache<K, V, E> {
    // stops the sweeper before `shared` is dropped
    janitor: Option<Janitor>,
    shared: Arc<Shared<K, V, E>>,
}

struct Shared<K, V, E> {
    name: Cow<'static, str>,
    config: CacheConfig,
    loader: Box<dyn Loader<K, V, E>>,
    clock: Arc<dyn Clock>,
    release: Option<ReleaseHook<V>>,
    entries: RwLock<FxHashMap<K, Entry<V>>>,
    policy: Mutex<Box<dyn EvictionPolicy<K>>>,
    flights: Mutex<FxHashMap<K, Arc<Flight<V, E>>>>,
    metrics: CacheMetrics,
}

impl<K, V, E> Cache<K, V, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + fmt::Debug + 'static,
{
    pub(crate) fn from_parts(
        config: CacheConfig,
        name: Cow<'static, str>,
        loader: Box<dyn Loader<K, V, E>>,
        clock: Arc<dyn Clock>,
        release: Option<ReleaseHook<V>>,
    ) -> Self {
        let policy = config.policy.build::<K>(config.capacity);
        let cleanup_interval = config.cleanup_interval;
        let shared = Arc::new(Shared {
            name,
            config,
            loader,
            clock,
            release,
            entries: RwLock::new(FxHashMap::default()),
            policy: Mutex::new(policy),
            flights: Mutex::new(FxHashMap::default()),
            metrics: CacheMetrics::new(),
        });
        let janitor = cleanup_interval.and_then(|interval| Janitor::spawn(&shared, interval));
        Self { janitor, shared }
    }

    /// Returns the value for `key`, loading it if absent or hard expired.
    ///
    /// Blocks only while this key's load is in flight. Loader errors are
    /// returned to every caller waiting on that load and are not cached.
    pub fn get(&self, key: &K) -> Result<V, E> {
        self.shared.get(key)
    }

    /// Returns the resident value for `key` if it has not hard expired.
    ///
    /// Never loads, never schedules a refresh and does not count as an access
    /// for the eviction policy.
    pub fn get_if_present(&self, key: &K) -> Option<V> {
        let now = self.shared.clock.now();
        let entries = self.shared.entries.read();
        let entry = entries.get(key)?;
        match self.shared.freshness(entry, now) {
            Freshness::Fresh | Freshness::Stale => Some(entry.value.clone()),
            Freshness::Expired => None,
        }
    }

    /// Installs `value` as a freshly loaded entry, evicting if needed.
    pub fn insert(&self, key: K, value: V) {
        self.shared.install(key, value);
    }

    /// Drops the entry for `key`. Returns `false` if it was not resident.
    ///
    /// A load already in flight for `key` is not cancelled and will install
    /// its result when it finishes.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = {
            let mut entries = self.shared.entries.write();
            self.shared.policy.lock().remove(key);
            entries.remove(key)
        };
        match removed {
            Some(entry) => {
                self.shared.dispose(entry.value, Removal::Invalidated);
                true
            },
            None => false,
        }
    }

    /// Drops every resident entry.
    pub fn purge(&self) {
        let drained: Vec<V> = {
            let mut entries = self.shared.entries.write();
            self.shared.policy.lock().clear();
            entries.drain().map(|(_, entry)| entry.value).collect()
        };
        for value in drained {
            self.shared.dispose(value, Removal::Invalidated);
        }
    }

    /// Drops every entry past the hard expiry window; returns how many.
    pub fn purge_expired(&self) -> usize {
        self.shared.purge_expired()
    }

    pub fn state(&self, key: &K) -> EntryState {
        let now = self.shared.clock.now();
        let resident = self
            .shared
            .entries
            .read()
            .get(key)
            .map(|entry| self.shared.freshness(entry, now));
        match resident {
            Some(Freshness::Fresh) => EntryState::Fresh,
            Some(Freshness::Stale | Freshness::Expired) => EntryState::Expired,
            None if self.shared.flights.lock().contains_key(key) => EntryState::Loading,
            None => EntryState::Empty,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shared.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.shared.metrics.snapshot(self.len(), self.capacity())
    }
}

impl<K, V, E> fmt::Debug for Cache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.shared.name)
            .field("config", &self.shared.config)
            .field("len", &self.shared.entries.read().len())
            .field("in_flight", &self.shared.flights.lock().len())
            .finish()
    }
}

impl<K, V, E> Shared<K, V, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + fmt::Debug + 'static,
{
    fn freshness(&self, entry: &Entry<V>, now: std::time::Instant) -> Freshness {
        entry.freshness(now, self.config.freshness, self.config.hard_expiry)
    }

    fn get(self: &Arc<Self>, key: &K) -> Result<V, E> {
        self.metrics.record_get_call();
        let mut missed = false;
        loop {
            if let Some(value) = self.lookup(key) {
                return Ok(value);
            }
            if !missed {
                self.metrics.record_miss();
                missed = true;
            }
            match self.claim_flight(key) {
                FlightRole::Leader(flight) => return self.lead(key, &flight),
                FlightRole::Waiter(flight) => {
                    self.metrics.record_coalesced_wait();
                    if let Some(result) = flight.wait() {
                        return result;
                    }
                    // leader panicked; start over
                },
            }
        }
    }

    /// Hit path: serves fresh and stale entries, schedules the stale window's
    /// refresh. Returns `None` when the caller must go through a flight.
    fn lookup(self: &Arc<Self>, key: &K) -> Option<V> {
        let now = self.clock.now();
        let (value, refresh) = {
            let entries = self.entries.read();
            let entry = entries.get(key)?;
            match self.freshness(entry, now) {
                Freshness::Fresh => {
                    self.metrics.record_hit();
                    (entry.value.clone(), false)
                },
                Freshness::Stale => {
                    self.metrics.record_stale_hit();
                    (entry.value.clone(), entry.claim_refresh())
                },
                Freshness::Expired => return None,
            }
        };
        // promotion is best effort; a hit never queues behind an admission
        if let Some(mut policy) = self.policy.try_lock() {
            policy.touch(key);
        }
        if refresh {
            self.schedule_refresh(key.clone());
        }
        Some(value)
    }

    fn claim_flight(&self, key: &K) -> FlightRole<V, E> {
        let mut flights = self.flights.lock();
        if let Some(existing) = flights.get(key) {
            return FlightRole::Waiter(Arc::clone(existing));
        }
        let flight = Arc::new(Flight::new());
        flights.insert(key.clone(), Arc::clone(&flight));
        FlightRole::Leader(flight)
    }

    fn finish_flight(&self, key: &K, flight: &Arc<Flight<V, E>>) {
        let mut flights = self.flights.lock();
        if flights
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            flights.remove(key);
        }
    }

    fn lead(&self, key: &K, flight: &Arc<Flight<V, E>>) -> Result<V, E> {
        // a previous leader may have installed the value after our lookup
        if let Some(value) = self.usable(key) {
            flight.complete(Ok(value.clone()));
            self.finish_flight(key, flight);
            return Ok(value);
        }
        self.expire(key);

        match self.run_loader(key) {
            Ok(Ok(value)) => {
                // install before unregistering so newcomers see the entry or the flight
                self.install(key.clone(), value.clone());
                flight.complete(Ok(value.clone()));
                self.finish_flight(key, flight);
                Ok(value)
            },
            Ok(Err(err)) => {
                flight.complete(Err(err.clone()));
                self.finish_flight(key, flight);
                Err(err)
            },
            Err(payload) => {
                flight.abandon();
                self.finish_flight(key, flight);
                resume_unwind(payload)
            },
        }
    }

    /// Resident value that may still be served, without touching the policy.
    fn usable(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        match self.freshness(entry, now) {
            Freshness::Fresh | Freshness::Stale => Some(entry.value.clone()),
            Freshness::Expired => None,
        }
    }

    fn run_loader(&self, key: &K) -> thread::Result<Result<V, E>> {
        self.metrics.record_load();
        let result = catch_unwind(AssertUnwindSafe(|| self.loader.load(key)));
        if !matches!(result, Ok(Ok(_))) {
            self.metrics.record_load_failure();
        }
        result
    }

    /// Force-evicts `key` if its entry is past the hard expiry window.
    fn expire(&self, key: &K) {
        let now = self.clock.now();
        let is_expired = |entries: &FxHashMap<K, Entry<V>>| {
            entries
                .get(key)
                .is_some_and(|entry| self.freshness(entry, now) == Freshness::Expired)
        };
        if !is_expired(&*self.entries.read()) {
            return;
        }
        let removed = {
            let mut entries = self.entries.write();
            if !is_expired(&*entries) {
                return;
            }
            self.policy.lock().remove(key);
            entries.remove(key)
        };
        if let Some(entry) = removed {
            self.dispose(entry.value, Removal::Expired);
        }
    }

    fn install(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut removed = Vec::new();
        {
            let mut entries = self.entries.write();
            let mut policy = self.policy.lock();
            if let Some(old) = entries.insert(key.clone(), Entry::new(value, now)) {
                removed.push((old.value, Removal::Replaced));
                if !policy.contains(&key) {
                    policy.admit(key);
                }
            } else {
                // hard-expired entries go before any live key is considered
                for value in self.drain_expired(&mut entries, &mut **policy, now) {
                    removed.push((value, Removal::Expired));
                }
                while policy.is_full() {
                    let Some(victim) = policy.pop_victim() else {
                        break;
                    };
                    if let Some(evicted) = entries.remove(&victim) {
                        removed.push((evicted.value, Removal::Evicted));
                    }
                }
                policy.admit(key);
            }
        }
        for (value, cause) in removed {
            self.dispose(value, cause);
        }
    }

    /// Removes every hard-expired entry from both the map and the policy.
    /// Caller holds both locks and releases the returned values.
    fn drain_expired(
        &self,
        entries: &mut FxHashMap<K, Entry<V>>,
        policy: &mut (dyn EvictionPolicy<K> + 'static),
        now: std::time::Instant,
    ) -> Vec<V> {
        let keys: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| self.freshness(entry, now) == Freshness::Expired)
            .map(|(key, _)| key.clone())
            .collect();
        keys.into_iter()
            .filter_map(|key| {
                policy.remove(&key);
                entries.remove(&key).map(|entry| entry.value)
            })
            .collect()
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<V> = {
            let mut entries = self.entries.write();
            let mut policy = self.policy.lock();
            self.drain_expired(&mut entries, &mut **policy, now)
        };
        let count = expired.len();
        for value in expired {
            self.dispose(value, Removal::Expired);
        }
        count
    }

    /// Runs the release hook for a value that is no longer reachable.
    fn dispose(&self, value: V, cause: Removal) {
        match cause {
            Removal::Evicted => {
                self.metrics.record_eviction();
                debug!(cache = %self.name, "evicted entry over capacity");
            },
            Removal::Expired => self.metrics.record_expiry(),
            Removal::Replaced | Removal::Invalidated => {},
        }
        let Some(hook) = &self.release else {
            return;
        };
        match hook(&value) {
            Ok(()) => self.metrics.record_release(),
            Err(err) => {
                self.metrics.record_release_failure();
                warn!(cache = %self.name, ?cause, error = %err, "failed to release cached value");
            },
        }
    }

    fn schedule_refresh(self: &Arc<Self>, key: K) {
        let flight = match self.claim_flight(&key) {
            FlightRole::Leader(flight) => flight,
            // someone is already loading this key
            FlightRole::Waiter(_) => return,
        };
        self.metrics.record_refresh_scheduled();

        let shared = Arc::clone(self);
        let thread_key = key.clone();
        let thread_flight = Arc::clone(&flight);
        let spawned = thread::Builder::new()
            .name(format!("{}-refresh", self.name))
            .spawn(move || shared.refresh(&thread_key, &thread_flight));
        if let Err(err) = spawned {
            warn!(cache = %self.name, error = %err, "failed to spawn refresh thread");
            self.metrics.record_refresh_failure();
            flight.abandon();
            self.finish_flight(&key, &flight);
        }
    }

    /// Background reload of a stale entry.
    ///
    /// The result goes through [`install`](Self::install) even if the key was
    /// evicted or invalidated while the loader ran: callers that missed in
    /// the meantime are parked on this flight and are handed this value, so
    /// it is admitted like any other load and may evict another key.
    fn refresh(&self, key: &K, flight: &Arc<Flight<V, E>>) {
        let refreshed = match self.run_loader(key) {
            Ok(Ok(value)) => {
                self.install(key.clone(), value.clone());
                flight.complete(Ok(value));
                true
            },
            Ok(Err(err)) => {
                debug!(cache = %self.name, error = ?err, "background refresh failed, keeping stale value");
                flight.complete(Err(err));
                false
            },
            Err(_) => {
                warn!(cache = %self.name, "loader panicked during background refresh");
                flight.abandon();
                false
            },
        };
        self.finish_flight(key, flight);
        // counted last: a recorded failure means the flight is gone
        if refreshed {
            debug!(cache = %self.name, "refreshed stale entry");
        } else {
            self.metrics.record_refresh_failure();
        }
    }
}

impl<K, V, E> Drop for Shared<K, V, E> {
    fn drop(&mut self) {
        let Some(hook) = self.release.take() else {
            return;
        };
        for (_, entry) in self.entries.get_mut().drain() {
            if let Err(err) = hook(&entry.value) {
                warn!(cache = %self.name, error = %err, "failed to release cached value on shutdown");
            }
        }
    }
}

/// Background sweeper dropping hard-expired entries.
struct Janitor {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Janitor {
    fn spawn<K, V, E>(shared: &Arc<Shared<K, V, E>>, interval: Duration) -> Option<Self>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: Clone + Send + fmt::Debug + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let weak: Weak<Shared<K, V, E>> = Arc::downgrade(shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-janitor", shared.name))
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {},
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let purged = shared.purge_expired();
                if purged > 0 {
                    debug!(cache = %shared.name, purged, "swept expired entries");
                }
            });
        match spawned {
            Ok(handle) => Some(Self {
                stop: Some(stop),
                handle: Some(handle),
            }),
            Err(err) => {
                warn!(cache = %shared.name, error = %err, "failed to spawn janitor thread");
                None
            },
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
