//! Eviction policies bounding the number of resident keys.

pub mod lru;
pub mod two_q;

use std::hash::Hash;

use crate::traits::EvictionPolicy;

pub use lru::LruPolicy;
pub use two_q::TwoQueuePolicy;

/// Available eviction policy shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyKind {
    /// Probation FIFO + protected LRU. Resists pollution by one-off keys.
    #[default]
    TwoQueue,
    /// Plain least recently used.
    Lru,
}

impl PolicyKind {
    /// Creates an empty policy of this kind.
    pub fn build<K>(self, capacity: usize) -> Box<dyn EvictionPolicy<K>>
    where
        K: Clone + Eq + Hash + Send + 'static,
    {
        match self {
            PolicyKind::TwoQueue => Box::new(TwoQueuePolicy::new(capacity)),
            PolicyKind::Lru => Box::new(LruPolicy::new(capacity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_each_kind() {
        for kind in [PolicyKind::TwoQueue, PolicyKind::Lru] {
            let mut policy = kind.build::<u64>(2);
            assert_eq!(policy.capacity(), 2);
            policy.admit(1);
            policy.admit(2);
            assert!(policy.is_full());
            assert_eq!(policy.pop_victim(), Some(1), "{kind:?}");
        }
    }
}
