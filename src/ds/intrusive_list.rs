//! Doubly linked key queue whose nodes live in a [`SlotArena`].
//!
//! The eviction policies keep the returned [`SlotId`] next to each key, so
//! unlinking or moving a key is O(1) without a search.
//!
//! ```text
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//!           front                    back
//! ```

use std::iter;

use crate::ds::slot_arena::{SlotArena, SlotId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Links {
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    links: Links,
}

#[derive(Debug)]
pub struct IntrusiveList<T> {
    arena: SlotArena<Node<T>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

impl<T> IntrusiveList<T> {
    pub fn new() -> Self {
        Self {
            arena: SlotArena::new(),
            head: None,
            tail: None,
        }
    }

    /// Reserves room for `capacity` nodes; the policies size it to their bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: SlotArena::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.arena.get(id).map(|node| &node.value)
    }

    /// Values from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        iter::successors(self.head.and_then(|id| self.arena.get(id)), |node| {
            node.links.next.and_then(|id| self.arena.get(id))
        })
        .map(|node| &node.value)
    }

    pub fn push_front(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            links: Links::default(),
        });
        self.splice_after(None, id);
        id
    }

    pub fn push_back(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            links: Links::default(),
        });
        self.splice_after(self.tail, id);
        id
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.remove(self.head?)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        self.remove(self.tail?)
    }

    /// Unlinks `id` and returns its value; `None` for a stale id.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        self.unlink(id)?;
        self.arena.remove(id).map(|node| node.value)
    }

    /// Returns `false` if `id` is stale.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        if self.head == Some(id) {
            return true;
        }
        if self.unlink(id).is_none() {
            return false;
        }
        self.splice_after(None, id);
        true
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.head = None;
        self.tail = None;
    }

    fn links_mut(&mut self, id: SlotId) -> Option<&mut Links> {
        self.arena.get_mut(id).map(|node| &mut node.links)
    }

    /// Links a detached `id` right after `prev`, or at the head for `None`.
    fn splice_after(&mut self, prev: Option<SlotId>, id: SlotId) {
        let next = match prev {
            Some(prev) => self.arena.get(prev).and_then(|node| node.links.next),
            None => self.head,
        };
        if let Some(links) = self.links_mut(id) {
            *links = Links { prev, next };
        }
        match prev.and_then(|prev| self.links_mut(prev)) {
            Some(links) => links.next = Some(id),
            None => self.head = Some(id),
        }
        match next.and_then(|next| self.links_mut(next)) {
            Some(links) => links.prev = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Detaches `id` from its neighbours, leaving it in the arena.
    fn unlink(&mut self, id: SlotId) -> Option<()> {
        let Links { prev, next } = std::mem::take(self.links_mut(id)?);
        match prev.and_then(|prev| self.links_mut(prev)) {
            Some(links) => links.next = next,
            None => self.head = next,
        }
        match next.and_then(|next| self.links_mut(next)) {
            Some(links) => links.prev = prev,
            None => self.tail = prev,
        }
        Some(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let mut walked = 0usize;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = self.arena.get(id).expect("linked node missing from arena");
            assert_eq!(node.links.prev, prev, "broken back link");
            prev = Some(id);
            cursor = node.links.next;
            walked += 1;
            assert!(walked <= self.len(), "cycle in list");
        }
        assert_eq!(self.tail, prev, "tail is not the last node");
        assert_eq!(walked, self.len(), "arena holds unlinked nodes");
    }
}

impl<T> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}
