//! Least Recently Used policy over resident keys.
//!
//! Single recency queue: admissions and accesses move a key to the front, the
//! victim is the key at the back. Useful when every key is expected to be
//! reused and scan resistance buys nothing (e.g. a one-slot snapshot cache).
//!
//! ```text
//!   front (MRU) ─► [k3] ◄──► [k1] ◄──► [k2] ◄── back (LRU, next victim)
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::traits::EvictionPolicy;

#[derive(Debug)]
pub struct LruPolicy<K> {
    index: FxHashMap<K, SlotId>,
    list: IntrusiveList<K>,
    capacity: usize,
}

impl<K> LruPolicy<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            list: IntrusiveList::with_capacity(capacity),
            capacity,
        }
    }

    /// Keys from least to most recently used.
    pub fn eviction_order(&self) -> Vec<K> {
        let mut keys: Vec<K> = self.list.iter().cloned().collect();
        keys.reverse();
        keys
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        assert_eq!(self.index.len(), self.list.len());
        for (key, node) in &self.index {
            assert!(self.list.get(*node) == Some(key));
        }
    }
}

impl<K> EvictionPolicy<K> for LruPolicy<K>
where
    K: Clone + Eq + Hash + Send,
{
    fn admit(&mut self, key: K) {
        if self.touch(&key) {
            return;
        }
        let node = self.list.push_front(key.clone());
        self.index.insert(key, node);
    }

    fn touch(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(node) => self.list.move_to_front(*node),
            None => false,
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(node) => self.list.remove(node).is_some(),
            None => false,
        }
    }

    fn pop_victim(&mut self) -> Option<K> {
        let victim = self.list.pop_back()?;
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
        self.list.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut policy = LruPolicy::new(3);
        policy.admit(1);
        policy.admit(2);
        policy.admit(3);
        policy.touch(&1);

        assert_eq!(policy.eviction_order(), vec![2, 3, 1]);
        assert_eq!(policy.pop_victim(), Some(2));
        assert_eq!(policy.pop_victim(), Some(3));
        assert_eq!(policy.pop_victim(), Some(1));
        assert!(policy.is_empty());
    }

    #[test]
    fn readmission_is_an_access() {
        let mut policy = LruPolicy::new(2);
        policy.admit("a");
        policy.admit("b");
        policy.admit("a");
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.pop_victim(), Some("b"));
        policy.debug_validate_invariants();
    }

    #[test]
    fn remove_unknown_is_false() {
        let mut policy: LruPolicy<u8> = LruPolicy::new(1);
        assert!(!policy.remove(&0));
        policy.admit(0);
        assert!(policy.is_full());
        assert!(policy.remove(&0));
        assert!(!policy.is_full());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_len_within_capacity(
            capacity in 1usize..16,
            keys in prop::collection::vec(0u16..64, 0..200)
        ) {
            let mut policy = LruPolicy::new(capacity);
            for k in keys {
                if !policy.contains(&k) && policy.is_full() {
                    policy.pop_victim();
                }
                policy.admit(k);
                prop_assert!(policy.len() <= capacity);
            }
            policy.debug_validate_invariants();
        }
    }
}
