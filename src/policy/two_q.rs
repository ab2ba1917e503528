//! Two-Queue (2Q) admission policy over resident keys.
//!
//! Separates keys seen once from keys seen repeatedly. One-off keys (a query
//! string used a single time, a tag looked up once) stay in the probation
//! tier and are the first to go, so they cannot push out the small hot set
//! that is reused on every request.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          TwoQueuePolicy<K> Layout                           │
//! │                                                                             │
//! │   index: FxHashMap<K, Resident { tier, node }>                              │
//! │                                                                             │
//! │   PROBATION (FIFO, admitted once)         PROTECTED (LRU, seen again)       │
//! │   ┌─────────────────────────┐             ┌─────────────────────────┐       │
//! │   │ front             back  │             │ front             back  │       │
//! │   │  ▼                  ▼   │             │  ▼                  ▼   │       │
//! │   │ [A] ◄──► [D] ◄──► [E]   │             │ [B] ◄──► [C]            │       │
//! │   │ oldest         newest   │             │ MRU          LRU        │       │
//! │   └─────────────────────────┘             └─────────────────────────┘       │
//! │                                                                             │
//! │   • admit(new)        → push back of probation                              │
//! │   • touch(probation)  → unlink, push front of protected                     │
//! │   • touch(protected)  → move to front of protected                          │
//! │   • pop_victim()      → probation front, else protected back                │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation    | Time | Notes                                        |
//! |--------------|------|----------------------------------------------|
//! | `admit`      | O(1) | Existing key counts as a touch               |
//! | `touch`      | O(1) | Promotes probation → protected               |
//! | `remove`     | O(1) | Either tier                                  |
//! | `pop_victim` | O(1) | Probation first, protected only when empty   |
//!
//! Victim selection never looks at capacity; the caller decides when a victim
//! is needed. Ties are impossible: both tiers are strictly ordered, and keys
//! admitted earlier sit closer to the probation front.
//!
//! ## Example
//!
//! ```
//! use flightcache::policy::two_q::TwoQueuePolicy;
//! use flightcache::traits::EvictionPolicy;
//!
//! let mut policy = TwoQueuePolicy::new(2);
//! policy.admit("a");
//! policy.admit("b");
//! policy.touch(&"b"); // b is protected now
//!
//! assert_eq!(policy.pop_victim(), Some("a"));
//! assert_eq!(policy.pop_victim(), Some("b"));
//! assert_eq!(policy.pop_victim(), None);
//! ```
//!
//! ## References
//!
//! - Johnson & Shasha, "2Q: A Low Overhead High Performance Buffer Management
//!   Replacement Algorithm", VLDB 1994

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::traits::EvictionPolicy;

/// Which tier a resident key sits in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Tier {
    /// Admitted once, FIFO ordered.
    Probation,
    /// Accessed again after admission, LRU ordered.
    Protected,
}

#[derive(Copy, Clone, Debug)]
struct Resident {
    tier: Tier,
    node: SlotId,
}

/// Two-tier probation/protected queue over keys.
#[derive(Debug)]
pub struct TwoQueuePolicy<K> {
    index: FxHashMap<K, Resident>,
    probation: IntrusiveList<K>,
    protected: IntrusiveList<K>,
    capacity: usize,
}

impl<K> TwoQueuePolicy<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty policy for at most `capacity` resident keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            probation: IntrusiveList::with_capacity(capacity),
            protected: IntrusiveList::new(),
            capacity,
        }
    }

    /// Returns the tier `key` is in, if tracked.
    pub fn tier(&self, key: &K) -> Option<Tier> {
        self.index.get(key).map(|resident| resident.tier)
    }

    pub fn probation_len(&self) -> usize {
        self.probation.len()
    }

    pub fn protected_len(&self) -> usize {
        self.protected.len()
    }

    /// Keys in eviction order: probation oldest first, then protected LRU first.
    pub fn eviction_order(&self) -> Vec<K> {
        let mut protected: Vec<K> = self.protected.iter().cloned().collect();
        protected.reverse();
        self.probation.iter().cloned().chain(protected).collect()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.probation.debug_validate_invariants();
        self.protected.debug_validate_invariants();
        assert_eq!(
            self.index.len(),
            self.probation.len() + self.protected.len(),
            "index and tiers disagree on resident count"
        );
        for (key, resident) in &self.index {
            let list = match resident.tier {
                Tier::Probation => &self.probation,
                Tier::Protected => &self.protected,
            };
            assert!(list.get(resident.node) == Some(key), "index points at wrong node");
        }
    }
}

impl<K> EvictionPolicy<K> for TwoQueuePolicy<K>
where
    K: Clone + Eq + Hash + Send,
{
    fn admit(&mut self, key: K) {
        if self.touch(&key) {
            return;
        }
        let node = self.probation.push_back(key.clone());
        self.index.insert(
            key,
            Resident {
                tier: Tier::Probation,
                node,
            },
        );
    }

    fn touch(&mut self, key: &K) -> bool {
        let Some(resident) = self.index.get_mut(key) else {
            return false;
        };
        match resident.tier {
            Tier::Probation => {
                if let Some(owned) = self.probation.remove(resident.node) {
                    resident.node = self.protected.push_front(owned);
                    resident.tier = Tier::Protected;
                }
            },
            Tier::Protected => {
                self.protected.move_to_front(resident.node);
            },
        }
        true
    }

    fn remove(&mut self, key: &K) -> bool {
        let Some(resident) = self.index.remove(key) else {
            return false;
        };
        match resident.tier {
            Tier::Probation => self.probation.remove(resident.node),
            Tier::Protected => self.protected.remove(resident.node),
        };
        true
    }

    fn pop_victim(&mut self) -> Option<K> {
        let victim = self
            .probation
            .pop_front()
            .or_else(|| self.protected.pop_back())?;
        self.index.remove(&victim);
        Some(victim)
    }

    fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&mut self) {
        self.index.clear();
        self.probation.clear();
        self.protected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Admits `key` the way the cache does: make room first, then admit.
    fn admit_bounded(policy: &mut TwoQueuePolicy<&'static str>, key: &'static str) -> Option<&'static str> {
        let mut evicted = None;
        if !policy.contains(&key) && policy.is_full() {
            evicted = policy.pop_victim();
        }
        policy.admit(key);
        evicted
    }

    #[test]
    fn new_keys_enter_probation() {
        let mut policy = TwoQueuePolicy::new(4);
        policy.admit("a");
        assert_eq!(policy.tier(&"a"), Some(Tier::Probation));
        assert_eq!(policy.probation_len(), 1);
        assert_eq!(policy.protected_len(), 0);
    }

    #[test]
    fn second_access_promotes() {
        let mut policy = TwoQueuePolicy::new(4);
        policy.admit("a");
        assert!(policy.touch(&"a"));
        assert_eq!(policy.tier(&"a"), Some(Tier::Protected));

        // re-admission of a resident key is an access, not a duplicate
        policy.admit("a");
        assert_eq!(policy.len(), 1);
        policy.debug_validate_invariants();
    }

    #[test]
    fn touch_unknown_key_is_noop() {
        let mut policy: TwoQueuePolicy<u32> = TwoQueuePolicy::new(2);
        assert!(!policy.touch(&7));
        assert!(!policy.remove(&7));
        assert!(policy.is_empty());
    }

    #[test]
    fn one_off_keys_evicted_oldest_first() {
        let mut policy = TwoQueuePolicy::new(2);
        assert_eq!(admit_bounded(&mut policy, "A"), None);
        assert_eq!(admit_bounded(&mut policy, "B"), None);
        assert_eq!(admit_bounded(&mut policy, "C"), Some("A"));
        assert!(policy.contains(&"B"));
        assert!(policy.contains(&"C"));
        assert_eq!(policy.len(), 2);
    }

    #[test]
    fn promoted_key_survives_newcomer() {
        let mut policy = TwoQueuePolicy::new(2);
        admit_bounded(&mut policy, "A");
        admit_bounded(&mut policy, "B");
        policy.touch(&"B");

        assert_eq!(admit_bounded(&mut policy, "C"), Some("A"));
        assert_eq!(policy.tier(&"B"), Some(Tier::Protected));
        assert_eq!(policy.tier(&"C"), Some(Tier::Probation));
    }

    #[test]
    fn protected_evicted_lru_when_probation_empty() {
        let mut policy = TwoQueuePolicy::new(3);
        for key in ["a", "b", "c"] {
            policy.admit(key);
            policy.touch(&key);
        }
        // c is MRU; refresh a so b becomes the LRU protected key
        policy.touch(&"a");

        assert_eq!(policy.probation_len(), 0);
        assert_eq!(policy.pop_victim(), Some("b"));
        assert_eq!(policy.pop_victim(), Some("c"));
        assert_eq!(policy.pop_victim(), Some("a"));
    }

    #[test]
    fn hot_set_resists_scan() {
        let mut policy = TwoQueuePolicy::new(4);
        for key in ["q1", "q2", "q3"] {
            admit_bounded(&mut policy, key);
            policy.touch(&key);
        }
        for one_off in ["s1", "s2", "s3", "s4", "s5", "s6"] {
            admit_bounded(&mut policy, one_off);
        }
        for key in ["q1", "q2", "q3"] {
            assert_eq!(policy.tier(&key), Some(Tier::Protected), "{key} was evicted by a scan");
        }
        assert_eq!(policy.eviction_order(), vec!["s6", "q1", "q2", "q3"]);
        policy.debug_validate_invariants();
    }

    #[test]
    fn remove_from_either_tier() {
        let mut policy = TwoQueuePolicy::new(4);
        policy.admit(1);
        policy.admit(2);
        policy.touch(&2);

        assert!(policy.remove(&1));
        assert!(policy.remove(&2));
        assert!(policy.is_empty());
        assert_eq!(policy.pop_victim(), None);
        policy.debug_validate_invariants();
    }

    #[test]
    fn clear_resets_everything() {
        let mut policy = TwoQueuePolicy::new(4);
        policy.admit('x');
        policy.admit('y');
        policy.touch(&'y');
        policy.clear();
        assert!(policy.is_empty());
        assert_eq!(policy.tier(&'y'), None);
        policy.admit('z');
        assert_eq!(policy.pop_victim(), Some('z'));
    }
}
