//! # Capability traits
//!
//! The cache engine is assembled from three small seams:
//!
//! ```text
//!   ┌──────────────────────┐   ┌──────────────────────┐   ┌──────────────────────┐
//!   │   Loader<K, V, E>    │   │  EvictionPolicy<K>   │   │     Releasable       │
//!   │                      │   │                      │   │                      │
//!   │  load(&K) → V | E    │   │  admit / touch       │   │  release() → () | E  │
//!   │                      │   │  remove / pop_victim │   │                      │
//!   └──────────┬───────────┘   └──────────┬───────────┘   └──────────┬───────────┘
//!              │ miss / refresh           │ residency                │ eviction, expiry
//!              └──────────────────────────┼──────────────────────────┘
//!                                         ▼
//!                              ┌──────────────────────┐
//!                              │    Cache<K, V, E>    │
//!                              └──────────────────────┘
//! ```
//!
//! - [`Loader`] is the only way values enter the cache on a miss. Any
//!   `Fn(&K) -> Result<V, E>` closure is a loader.
//! - [`EvictionPolicy`] tracks resident keys and picks victims. It never sees
//!   values.
//! - [`Releasable`] is an optional capability of values that own an external
//!   resource. Caches built with
//!   [`CacheBuilder::release_on_evict`](crate::builder::CacheBuilder::release_on_evict)
//!   call it exactly once when an entry leaves the cache.

use std::error::Error;
use std::hash::Hash;

/// Produces the value for a key on a cache miss or refresh.
///
/// Loaders run without any cache lock held and may block on I/O.
pub trait Loader<K, V, E>: Send + Sync + 'static {
    fn load(&self, key: &K) -> Result<V, E>;
}

impl<K, V, E, F> Loader<K, V, E> for F
where
    F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
{
    fn load(&self, key: &K) -> Result<V, E> {
        self(key)
    }
}

/// Boxed error returned by a failed release.
pub type ReleaseError = Box<dyn Error + Send + Sync + 'static>;

/// A cached value that owns a closeable external resource.
pub trait Releasable {
    /// Frees the underlying resource.
    ///
    /// Called by the cache exactly once per entry, after the entry is no longer
    /// reachable through `get`. Failures are logged by the cache and dropped.
    fn release(&self) -> Result<(), ReleaseError>;
}

/// Tracks resident keys and selects eviction victims.
///
/// Implementations are single-threaded; the cache serializes every call
/// behind its policy lock.
pub trait EvictionPolicy<K>: Send
where
    K: Clone + Eq + Hash,
{
    /// Records a newly resident key, or counts a re-admission of a resident
    /// key as an access.
    fn admit(&mut self, key: K);

    /// Records an access to a resident key. Returns `false` if `key` is not
    /// tracked.
    fn touch(&mut self, key: &K) -> bool;

    /// Stops tracking `key`. Returns `false` if it was not tracked.
    fn remove(&mut self, key: &K) -> bool;

    /// Removes and returns the next victim, or `None` when empty.
    fn pop_victim(&mut self) -> Option<K>;

    fn contains(&self, key: &K) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn clear(&mut self);

    /// Returns `true` when one more admission would need a victim first.
    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}
