//! Registry of keys exempt from capacity eviction

use std::collections::HashSet;
use std::hash::Hash;
use ahash::RandomState;

/// Set of pinned keys.
///
/// A key may be pinned before it exists anywhere in the cache; the engine
/// consults the registry when it creates an entry.
pub(crate) struct PinRegistry<K> {
    keys: HashSet<K, RandomState>,
}

impl<K> PinRegistry<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            keys: HashSet::with_hasher(RandomState::new()),
        }
    }

    /// Record a pin. Returns true if the key was not pinned yet.
    pub fn pin(&mut self, key: K) -> bool {
        self.keys.insert(key)
    }

    /// Drop a pin. Returns true if the key was pinned.
    pub fn unpin(&mut self, key: &K) -> bool {
        self.keys.remove(key)
    }

    pub fn is_pinned(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.keys.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_unpin() {
        let mut pins = PinRegistry::new();

        assert!(pins.pin("a"));
        assert!(!pins.pin("a"));
        assert!(pins.is_pinned(&"a"));

        assert!(pins.unpin(&"a"));
        assert!(!pins.unpin(&"a"));
        assert!(!pins.is_pinned(&"a"));
    }

    #[test]
    fn test_keys_and_clear() {
        let mut pins = PinRegistry::new();

        pins.pin(2);
        pins.pin(1);
        let mut keys = pins.keys();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);
        assert_eq!(pins.len(), 2);

        pins.clear();
        assert_eq!(pins.len(), 0);
    }
}
