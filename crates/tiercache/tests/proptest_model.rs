//! Property-based tests comparing the engine against a simple model.
//!
//! Run with: `cargo test --test proptest_model`

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use tiercache::{CacheConfig, CacheEngine};

// =============================================================================
// Model
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u32),
    Get(u8),
    Remove(u8),
    Pin(u8),
    Unpin(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = 0u8..8;
    prop_oneof![
        4 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        3 => key.clone().prop_map(Op::Get),
        1 => key.clone().prop_map(Op::Remove),
        1 => key.clone().prop_map(Op::Pin),
        1 => key.prop_map(Op::Unpin),
    ]
}

/// Primary tier only: evicted entries are gone
struct Model {
    cap: usize,
    lru: bool,
    values: HashMap<u8, u32>,
    /// Unpinned keys, least recent first
    order: Vec<u8>,
    pins: HashSet<u8>,
}

impl Model {
    fn new(cap: usize, lru: bool) -> Self {
        Self {
            cap,
            lru,
            values: HashMap::new(),
            order: Vec::new(),
            pins: HashSet::new(),
        }
    }

    fn touch(&mut self, key: u8) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
            self.order.push(key);
        }
    }

    fn evict(&mut self) {
        while self.order.len() > self.cap {
            let key = self.order.remove(0);
            self.values.remove(&key);
        }
    }

    fn put(&mut self, key: u8, value: u32) -> Option<u32> {
        if let Some(old) = self.values.insert(key, value) {
            if self.lru {
                self.touch(key);
            }
            return Some(old);
        }
        if !self.pins.contains(&key) {
            self.order.push(key);
            self.evict();
        }
        None
    }

    fn get(&mut self, key: u8) -> Option<u32> {
        let value = *self.values.get(&key)?;
        if self.lru {
            self.touch(key);
        }
        Some(value)
    }

    fn remove(&mut self, key: u8) -> Option<u32> {
        self.pins.remove(&key);
        self.order.retain(|k| *k != key);
        self.values.remove(&key)
    }

    fn pin(&mut self, key: u8) -> bool {
        self.pins.insert(key);
        self.order.retain(|k| *k != key);
        self.values.contains_key(&key)
    }

    fn unpin(&mut self, key: u8) -> bool {
        let was_pinned = self.pins.remove(&key);
        if self.values.contains_key(&key) && !self.order.contains(&key) {
            self.order.push(key);
            self.evict();
        }
        was_pinned
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_matches_model_without_overflow(
        cap in 0usize..5,
        lru in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 1..120),
    ) {
        let cache: CacheEngine<u8, u32> = CacheEngine::new(
            CacheConfig::default()
                .with_lru(lru)
                .with_cache_size(Some(cap))
                .with_soft_size(Some(0)),
        ).unwrap();
        let mut model = Model::new(cap, lru);

        for op in ops {
            match op {
                Op::Put(k, v) => prop_assert_eq!(cache.put(k, v).unwrap(), model.put(k, v)),
                Op::Get(k) => prop_assert_eq!(cache.get(&k).unwrap(), model.get(k)),
                Op::Remove(k) => prop_assert_eq!(cache.remove(&k).unwrap(), model.remove(k)),
                Op::Pin(k) => prop_assert_eq!(cache.pin(k).unwrap(), model.pin(k)),
                Op::Unpin(k) => prop_assert_eq!(cache.unpin(&k).unwrap(), model.unpin(k)),
            }
            prop_assert_eq!(cache.size(), model.values.len());
        }

        for key in 0u8..8 {
            prop_assert_eq!(cache.is_pinned(&key).unwrap(), model.pins.contains(&key));
        }
    }

    #[test]
    fn prop_unbounded_overflow_loses_nothing(
        cap in 0usize..4,
        ops in prop::collection::vec(op_strategy(), 1..120),
    ) {
        let cache: CacheEngine<u8, u32> = CacheEngine::new(
            CacheConfig::default()
                .with_lru(true)
                .with_cache_size(Some(cap)),
        ).unwrap();
        let mut latest: HashMap<u8, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    prop_assert_eq!(cache.put(k, v).unwrap(), latest.insert(k, v));
                }
                Op::Get(k) => prop_assert_eq!(cache.get(&k).unwrap(), latest.get(&k).copied()),
                Op::Remove(k) => prop_assert_eq!(cache.remove(&k).unwrap(), latest.remove(&k)),
                Op::Pin(k) => prop_assert_eq!(cache.pin(k).unwrap(), latest.contains_key(&k)),
                Op::Unpin(k) => { cache.unpin(&k).unwrap(); }
            }
        }

        prop_assert_eq!(cache.size(), latest.len());
        for (key, value) in &latest {
            prop_assert_eq!(cache.get(key).unwrap(), Some(*value));
        }
    }

    #[test]
    fn prop_pinned_keys_never_evicted(
        cap in 0usize..3,
        pinned in prop::collection::hash_set(0u8..16, 1..6),
        fillers in prop::collection::vec(16u8..=255, 0..100),
    ) {
        let cache: CacheEngine<u8, u8> = CacheEngine::new(
            CacheConfig::default()
                .with_lru(true)
                .with_cache_size(Some(cap))
                .with_soft_size(Some(0)),
        ).unwrap();

        for key in &pinned {
            cache.pin(*key).unwrap();
            cache.put(*key, *key).unwrap();
        }
        for key in fillers {
            cache.put(key, key).unwrap();
        }

        for key in &pinned {
            prop_assert_eq!(cache.get(key).unwrap(), Some(*key));
        }
        prop_assert!(cache.size() <= pinned.len() + cap);
    }
}
