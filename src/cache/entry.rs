use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Observable lifecycle state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not resident and not being loaded.
    Empty,
    /// Not resident; a load is in flight.
    Loading,
    /// Resident and younger than the freshness window.
    Fresh,
    /// Resident and past the freshness window (stale-but-usable or hard expired).
    Expired,
}

/// How a value left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    Evicted,
    Expired,
    Replaced,
    Invalidated,
}

/// Resident value and its load time.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    pub(crate) loaded_at: Instant,
    // set once the stale window has scheduled its single refresh
    refresh_claimed: AtomicBool,
}

/// Where an entry's age falls relative to the two windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl<V> Entry<V> {
    pub(crate) fn new(value: V, loaded_at: Instant) -> Self {
        Self {
            value,
            loaded_at,
            refresh_claimed: AtomicBool::new(false),
        }
    }

    pub(crate) fn freshness(&self, now: Instant, fresh_for: Duration, expires_after: Duration) -> Freshness {
        let age = now.saturating_duration_since(self.loaded_at);
        if age < fresh_for {
            Freshness::Fresh
        } else if age < expires_after {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Returns `true` for exactly one caller per entry.
    pub(crate) fn claim_refresh(&self) -> bool {
        self.refresh_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
