//! Overflow tier for entries pushed out of the primary tier
//!
//! Nothing here is guaranteed to stay. Handles expire after
//! `reclaim_after`, and once more than `soft_size` handles are held the
//! oldest admissions are dropped. Every read goes through
//! [`SoftHandle::upgrade`], so "was present, now gone" is an ordinary miss.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};
use ahash::RandomState;

/// A value that may be reclaimed at any time
pub(crate) struct SoftHandle<V> {
    value: V,
    admitted: Instant,
    generation: u64,
}

impl<V> SoftHandle<V> {
    fn new(value: V, admitted: Instant, generation: u64) -> Self {
        Self {
            value,
            admitted,
            generation,
        }
    }

    /// The value, unless the handle has outlived `ttl` at `now`
    pub fn upgrade(&self, ttl: Option<Duration>, now: Instant) -> Option<&V> {
        if self.is_expired(ttl, now) {
            None
        } else {
            Some(&self.value)
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.admitted) >= ttl)
    }

    fn into_live(self, ttl: Option<Duration>, now: Instant) -> Option<V> {
        if self.is_expired(ttl, now) {
            None
        } else {
            Some(self.value)
        }
    }
}

/// Outcome of taking an entry out of the overflow tier
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Promotion<V> {
    /// The entry was live and has been removed
    Live(V),
    /// The entry had outlived `reclaim_after`; its handle has been dropped
    Expired,
    /// No entry for the key
    Absent,
}

/// Outcome of offering an entry to the overflow tier
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Admission<K> {
    /// The tier is disabled; the entry was dropped
    Refused(K),
    /// The entry is held; `displaced` lists keys dropped because they
    /// expired or to honour `soft_size`
    Admitted { displaced: Vec<K> },
}

/// Unordered, best-effort secondary store
pub(crate) struct ReclaimableStore<K, V> {
    map: HashMap<K, SoftHandle<V>, RandomState>,
    /// Admission order; entries whose generation no longer matches the map are stale
    order: VecDeque<(K, u64)>,
    next_generation: u64,
    soft_size: Option<usize>,
    reclaim_after: Option<Duration>,
}

impl<K, V> ReclaimableStore<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(soft_size: Option<usize>, reclaim_after: Option<Duration>) -> Self {
        Self {
            map: HashMap::with_hasher(RandomState::new()),
            order: VecDeque::new(),
            next_generation: 0,
            soft_size,
            reclaim_after,
        }
    }

    /// Whether offers can be admitted at all
    pub fn is_enabled(&self) -> bool {
        self.soft_size != Some(0)
    }

    /// Best-effort admission of an entry
    pub fn offer(&mut self, key: K, value: V, now: Instant) -> Admission<K> {
        if !self.is_enabled() {
            return Admission::Refused(key);
        }

        let mut displaced = self.sweep_expired(now);

        let generation = self.next_generation;
        self.next_generation += 1;
        self.map
            .insert(key.clone(), SoftHandle::new(value, now, generation));
        self.order.push_back((key, generation));

        displaced.extend(self.shrink_to_soft_size());
        self.compact_order();
        Admission::Admitted { displaced }
    }

    /// Read a live value without removing it
    pub fn lookup(&self, key: &K, now: Instant) -> Option<&V> {
        self.map.get(key)?.upgrade(self.reclaim_after, now)
    }

    pub fn contains(&self, key: &K, now: Instant) -> bool {
        self.lookup(key, now).is_some()
    }

    /// Remove an entry, handing back its value if it is still live
    pub fn promote(&mut self, key: &K, now: Instant) -> Promotion<V> {
        match self.map.remove(key) {
            Some(handle) => match handle.into_live(self.reclaim_after, now) {
                Some(value) => Promotion::Live(value),
                None => Promotion::Expired,
            },
            None => Promotion::Absent,
        }
    }

    /// Drop every expired handle, returning the dropped keys
    pub fn purge(&mut self, now: Instant) -> Vec<K> {
        let ttl = self.reclaim_after;
        let mut expired = Vec::new();
        self.map.retain(|key, handle| {
            let keep = !handle.is_expired(ttl, now);
            if !keep {
                expired.push(key.clone());
            }
            keep
        });
        self.compact_order();
        expired
    }

    /// Change the count bound, returning keys dropped to meet it
    pub fn set_soft_size(&mut self, soft_size: Option<usize>) -> Vec<K> {
        self.soft_size = soft_size;
        let displaced = self.shrink_to_soft_size();
        self.compact_order();
        displaced
    }

    pub fn soft_size(&self) -> Option<usize> {
        self.soft_size
    }

    /// Number of handles still live at `now`
    pub fn live_len(&self, now: Instant) -> usize {
        match self.reclaim_after {
            None => self.map.len(),
            Some(ttl) => self
                .map
                .values()
                .filter(|handle| !handle.is_expired(Some(ttl), now))
                .count(),
        }
    }

    /// Live keys at `now`, oldest admission first
    pub fn live_keys(&self, now: Instant) -> Vec<K> {
        self.order
            .iter()
            .filter(|(key, generation)| {
                self.map.get(key).is_some_and(|handle| {
                    handle.generation == *generation && handle.upgrade(self.reclaim_after, now).is_some()
                })
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    /// Drop expired handles from the oldest end of the admission order.
    ///
    /// All handles share one TTL, so expiry follows admission order and the
    /// sweep stops at the first live handle.
    fn sweep_expired(&mut self, now: Instant) -> Vec<K> {
        let mut expired = Vec::new();
        let Some(ttl) = self.reclaim_after else {
            return expired;
        };
        while let Some((key, generation)) = self.order.front() {
            let state = self
                .map
                .get(key)
                .filter(|handle| handle.generation == *generation)
                .map(|handle| handle.is_expired(Some(ttl), now));
            match state {
                Some(false) => break,
                Some(true) => {
                    if let Some((key, _)) = self.order.pop_front() {
                        self.map.remove(&key);
                        expired.push(key);
                    }
                }
                None => {
                    self.order.pop_front();
                }
            }
        }
        expired
    }

    fn shrink_to_soft_size(&mut self) -> Vec<K> {
        let mut displaced = Vec::new();
        let Some(limit) = self.soft_size else {
            return displaced;
        };
        while self.map.len() > limit {
            let Some((key, generation)) = self.order.pop_front() else {
                break;
            };
            let current = self
                .map
                .get(&key)
                .is_some_and(|handle| handle.generation == generation);
            if current {
                self.map.remove(&key);
                displaced.push(key);
            }
        }
        displaced
    }

    /// Drop stale order records once they outnumber live ones
    fn compact_order(&mut self) {
        if self.order.len() <= self.map.len() * 2 + 16 {
            return;
        }
        let map = &self.map;
        self.order.retain(|(key, generation)| {
            map.get(key)
                .is_some_and(|handle| handle.generation == *generation)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted(displaced: Vec<i32>) -> Admission<i32> {
        Admission::Admitted { displaced }
    }

    #[test]
    fn test_offer_and_lookup() {
        let mut store = ReclaimableStore::new(None, None);
        let now = Instant::now();

        assert_eq!(store.offer(1, "a", now), admitted(vec![]));
        assert_eq!(store.lookup(&1, now), Some(&"a"));
        assert_eq!(store.lookup(&2, now), None);
        assert_eq!(store.live_len(now), 1);
    }

    #[test]
    fn test_disabled_tier_refuses() {
        let mut store = ReclaimableStore::new(Some(0), None);
        let now = Instant::now();

        assert!(!store.is_enabled());
        assert_eq!(store.offer(1, "a", now), Admission::Refused(1));
        assert_eq!(store.live_len(now), 0);
    }

    #[test]
    fn test_soft_size_drops_oldest() {
        let mut store = ReclaimableStore::new(Some(2), None);
        let now = Instant::now();

        store.offer(1, "a", now);
        store.offer(2, "b", now);
        assert_eq!(store.offer(3, "c", now), admitted(vec![1]));

        assert!(!store.contains(&1, now));
        assert_eq!(store.live_keys(now), vec![2, 3]);
    }

    #[test]
    fn test_reoffer_refreshes_admission() {
        let mut store = ReclaimableStore::new(Some(2), None);
        let now = Instant::now();

        store.offer(1, "a", now);
        store.offer(2, "b", now);
        store.offer(1, "a2", now);
        assert_eq!(store.offer(3, "c", now), admitted(vec![2]));

        assert_eq!(store.lookup(&1, now), Some(&"a2"));
    }

    #[test]
    fn test_expired_handles_read_as_absent() {
        let ttl = Duration::from_millis(10);
        let mut store = ReclaimableStore::new(None, Some(ttl));
        let start = Instant::now();

        store.offer(1, "a", start);
        assert_eq!(store.lookup(&1, start), Some(&"a"));

        let later = start + ttl;
        assert_eq!(store.lookup(&1, later), None);
        assert_eq!(store.live_len(later), 0);
        assert_eq!(store.promote(&1, later), Promotion::Expired);
        assert_eq!(store.promote(&1, start), Promotion::Absent);
    }

    #[test]
    fn test_promote_removes() {
        let mut store = ReclaimableStore::new(None, None);
        let now = Instant::now();

        store.offer(1, "a", now);
        assert_eq!(store.promote(&1, now), Promotion::Live("a"));
        assert_eq!(store.promote(&1, now), Promotion::Absent);
        assert!(store.live_keys(now).is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let ttl = Duration::from_secs(1);
        let mut store = ReclaimableStore::new(None, Some(ttl));
        let start = Instant::now();

        store.offer(1, "a", start);
        store.offer(2, "b", start + Duration::from_millis(500));

        let mut purged = store.purge(start + ttl);
        purged.sort();
        assert_eq!(purged, vec![1]);
        assert_eq!(store.lookup(&2, start + ttl), Some(&"b"));
    }

    #[test]
    fn test_shrink_soft_size() {
        let mut store = ReclaimableStore::new(None, None);
        let now = Instant::now();

        for i in 0..5 {
            store.offer(i, "x", now);
        }

        assert_eq!(store.set_soft_size(Some(2)), vec![0, 1, 2]);
        assert_eq!(store.live_keys(now), vec![3, 4]);
        assert_eq!(store.soft_size(), Some(2));
    }

    #[test]
    fn test_order_records_are_compacted() {
        let mut store = ReclaimableStore::new(None, None);
        let now = Instant::now();

        for _ in 0..1000 {
            store.offer(1, "x", now);
            store.promote(&1, now);
        }

        assert!(store.order.len() <= 18);
    }

    #[test]
    fn test_offer_sweeps_expired_handles() {
        let ttl = Duration::from_millis(10);
        let mut store = ReclaimableStore::new(None, Some(ttl));
        let start = Instant::now();

        let mut swept = 0;
        for i in 0..10_000u64 {
            let now = start + Duration::from_millis(i);
            if let Admission::Admitted { displaced } = store.offer(i, "x", now) {
                swept += displaced.len();
            }
        }

        // only handles younger than the TTL survive the last offer
        assert!(store.map.len() <= 11);
        assert!(store.order.len() <= store.map.len() * 2 + 16);
        assert_eq!(swept + store.map.len(), 10_000);
    }

    #[test]
    fn test_sweep_skips_superseded_records() {
        let ttl = Duration::from_millis(10);
        let mut store = ReclaimableStore::new(None, Some(ttl));
        let start = Instant::now();

        store.offer(1, "a", start);
        store.offer(2, "b", start);
        store.promote(&1, start);
        store.offer(1, "a2", start + Duration::from_millis(8));

        let later = start + Duration::from_millis(12);
        assert_eq!(store.offer(3, "c", later), admitted(vec![2]));
        assert_eq!(store.lookup(&1, later), Some(&"a2"));
    }
}
