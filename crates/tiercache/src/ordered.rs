//! Primary tier: bounded store ordered by insertion or by access
//!
//! Entries sit in a slab-backed doubly-linked list (head = most recent,
//! tail = least recent). Pinned entries stay in the map but are unlinked
//! from the list, so eviction pops the tail without scanning past them.

use std::collections::HashMap;
use std::hash::Hash;
use ahash::RandomState;

/// Node in the ordering list
struct Entry<K, V> {
    key: K,
    value: V,
    pinned: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded store holding at most `capacity` unpinned entries
pub(crate) struct OrderedStore<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Entry<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    unpinned: usize,
    capacity: Option<usize>,
    access_order: bool,
}

impl<K, V> OrderedStore<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a store; `None` capacity means unbounded
    pub fn new(capacity: Option<usize>, access_order: bool) -> Self {
        let initial = capacity.unwrap_or(0).min(1024);
        Self {
            map: HashMap::with_capacity_and_hasher(initial, RandomState::new()),
            nodes: Vec::with_capacity(initial),
            head: None,
            tail: None,
            free_list: Vec::new(),
            unpinned: 0,
            capacity,
            access_order,
        }
    }

    /// Get a value, touching it in access-order mode
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        if self.access_order {
            self.touch(idx);
        }
        self.nodes[idx].as_ref().map(|entry| &entry.value)
    }

    /// Get a value without changing its position
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|entry| &entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace. Returns the replaced value.
    ///
    /// `pinned` only applies to a new entry; an existing entry keeps its
    /// pin state. Capacity is not enforced here, see [`Self::evict_overflow`].
    pub fn insert(&mut self, key: K, value: V, pinned: bool) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            let previous = self.nodes[idx]
                .as_mut()
                .map(|entry| std::mem::replace(&mut entry.value, value));
            if self.access_order {
                self.touch(idx);
            }
            return previous;
        }

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Entry {
            key: key.clone(),
            value,
            pinned,
            prev: None,
            next: None,
        });
        if !pinned {
            self.link_front(idx);
            self.unpinned += 1;
        }
        self.map.insert(key, idx);
        None
    }

    /// Remove an entry, pinned or not
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        if !self.is_pinned_at(idx) {
            self.unlink(idx);
            self.unpinned -= 1;
        }
        self.free_node(idx);
        self.nodes[idx].take().map(|entry| entry.value)
    }

    /// Change the pin state of an entry. Returns false if the key is absent.
    ///
    /// Unpinning links the entry at the most-recent end; capacity is not
    /// enforced here.
    pub fn set_pinned(&mut self, key: &K, pinned: bool) -> bool {
        let Some(&idx) = self.map.get(key) else {
            return false;
        };
        if self.is_pinned_at(idx) == pinned {
            return true;
        }
        if pinned {
            self.unlink(idx);
            self.unpinned -= 1;
        }
        if let Some(entry) = &mut self.nodes[idx] {
            entry.pinned = pinned;
        }
        if !pinned {
            self.link_front(idx);
            self.unpinned += 1;
        }
        true
    }

    /// Whether unpinned entries exceed the capacity
    pub fn over_capacity(&self) -> bool {
        self.capacity.is_some_and(|cap| self.unpinned > cap)
    }

    /// Remove the least recent unpinned entry
    pub fn evict_lru(&mut self) -> Option<(K, V)> {
        let tail_idx = self.tail?;
        self.unlink(tail_idx);
        self.unpinned -= 1;
        self.free_node(tail_idx);
        let entry = self.nodes[tail_idx].take()?;
        self.map.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    /// Evict one entry at a time until the capacity holds, handing each
    /// evicted pair to `sink`. Returns the number evicted.
    pub fn evict_overflow(&mut self, mut sink: impl FnMut(K, V)) -> usize {
        let mut evicted = 0;
        while self.over_capacity() {
            match self.evict_lru() {
                Some((key, value)) => {
                    sink(key, value);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn unpinned_len(&self) -> usize {
        self.unpinned
    }

    /// Keys from most to least recent, then pinned keys in no particular order
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let Some(entry) = &self.nodes[idx] else {
                break;
            };
            keys.push(entry.key.clone());
            cursor = entry.next;
        }
        keys.extend(
            self.nodes
                .iter()
                .flatten()
                .filter(|entry| entry.pinned)
                .map(|entry| entry.key.clone()),
        );
        keys
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.unpinned = 0;
    }

    fn is_pinned_at(&self, idx: usize) -> bool {
        self.nodes[idx].as_ref().is_some_and(|entry| entry.pinned)
    }

    fn touch(&mut self, idx: usize) {
        if self.head == Some(idx) || self.is_pinned_at(idx) {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    fn link_front(&mut self, idx: usize) {
        if let Some(entry) = &mut self.nodes[idx] {
            entry.prev = None;
            entry.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = if let Some(entry) = &mut self.nodes[idx] {
            (entry.prev.take(), entry.next.take())
        } else {
            return;
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_entry) = &mut self.nodes[prev_idx] {
                    prev_entry.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_entry) = &mut self.nodes[next_idx] {
                    next_entry.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }
}
