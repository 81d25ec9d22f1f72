//! CacheEngine: primary tier, overflow tier and pin registry behind one lock

use std::sync::Arc;
use std::time::Instant;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::key::CacheKey;
use crate::listener::CacheListener;
use crate::ordered::OrderedStore;
use crate::pins::PinRegistry;
use crate::reclaimable::{Admission, Promotion, ReclaimableStore};
use crate::stats::CacheStats;

type OverflowFilter<K, V> = Box<dyn Fn(&K, &V) -> bool + Send + Sync>;

/// Everything the lock guards
struct Tiers<K, V> {
    primary: OrderedStore<K, V>,
    overflow: ReclaimableStore<K, V>,
    pins: PinRegistry<K>,
}

/// Bounded, thread-safe object cache with pinning and an overflow tier.
///
/// Unpinned entries beyond `cache_size` are evicted from the least recent
/// end of the primary tier and offered to the overflow tier, from which a
/// later `get` or `put` promotes them back. Pinned keys are never evicted.
///
/// ```
/// use tiercache::{CacheConfig, CacheEngine};
///
/// let config = CacheConfig::default().with_lru(true).with_cache_size(Some(1));
/// let cache = CacheEngine::new(config).unwrap();
///
/// cache.pin("a").unwrap();
/// cache.put("a", 1).unwrap();
/// cache.put("b", 2).unwrap();
/// cache.put("c", 3).unwrap(); // evicts "b" to the overflow tier
///
/// assert_eq!(cache.get(&"a").unwrap(), Some(1));
/// assert_eq!(cache.get(&"b").unwrap(), Some(2));
/// ```
pub struct CacheEngine<K, V> {
    tiers: RwLock<Tiers<K, V>>,
    stats: CacheStats,
    lru: bool,
    concurrency_hint: Option<usize>,
    listener: Option<Arc<dyn CacheListener<K, V>>>,
    overflow_filter: Option<OverflowFilter<K, V>>,
}

impl<K, V> CacheEngine<K, V>
where
    K: CacheKey,
    V: Clone,
{
    /// Create an engine from a validated configuration
    ///
    /// # Errors
    /// * `Error::Unsupported` - the configuration fails [`CacheConfig::validate`]
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        debug!(
            lru = config.lru_enabled,
            cache_size = ?config.cache_size,
            soft_size = ?config.soft_size,
            reclaim_after_ms = ?config.reclaim_after_ms,
            concurrency_hint = ?config.concurrency_hint,
            "creating cache engine"
        );

        Ok(Self {
            tiers: RwLock::new(Tiers {
                primary: OrderedStore::new(config.cache_size, config.lru_enabled),
                overflow: ReclaimableStore::new(config.soft_size, config.reclaim_after()),
                pins: PinRegistry::new(),
            }),
            stats: CacheStats::new(),
            lru: config.lru_enabled,
            concurrency_hint: config.concurrency_hint,
            listener: None,
            overflow_filter: None,
        })
    }

    /// Attach a listener for evictions and overflow drops
    pub fn with_listener(mut self, listener: Arc<dyn CacheListener<K, V>>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Only offer evicted entries the filter accepts to the overflow tier;
    /// the rest are discarded
    pub fn with_overflow_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        self.overflow_filter = Some(Box::new(filter));
        self
    }

    /// Get a value, touching it in LRU mode.
    ///
    /// A key found only in the overflow tier is promoted back into the
    /// primary tier, which may evict another entry.
    ///
    /// # Arguments
    /// * `key` - Key to look up
    ///
    /// # Returns
    /// * `Result<Option<V>>` - The cached value, or None on a miss
    ///
    /// # Errors
    /// * `Error::InvalidArgument` - the key has no identity
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        check_key(key, "get")?;
        let now = Instant::now();
        let mut tiers = self.tiers.write();

        if let Some(value) = tiers.primary.get(key).cloned() {
            self.stats.record_hit();
            return Ok(Some(value));
        }

        match self.take_overflow(&mut tiers.overflow, key, now) {
            Some(value) => {
                trace!("promoting entry from overflow tier");
                self.stats.record_hit();
                self.stats.record_promotion();
                let pinned = tiers.pins.is_pinned(key);
                tiers.primary.insert(key.clone(), value.clone(), pinned);
                self.enforce_capacity(&mut tiers, now);
                Ok(Some(value))
            }
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    /// Insert or replace a value
    ///
    /// # Arguments
    /// * `key` - Key to store under; created pinned if a pin is recorded
    /// * `value` - Value to store
    ///
    /// # Returns
    /// * `Result<Option<V>>` - The previous value from whichever tier held it
    ///
    /// # Errors
    /// * `Error::InvalidArgument` - the key has no identity
    pub fn put(&self, key: K, value: V) -> Result<Option<V>> {
        check_key(&key, "put")?;
        let now = Instant::now();
        let mut tiers = self.tiers.write();
        Ok(self.put_locked(&mut tiers, key, value, now))
    }

    /// Put every pair under a single lock acquisition.
    ///
    /// All keys are checked first; one invalid key rejects the whole batch.
    pub fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        for (key, _) in &entries {
            check_key(key, "put_all")?;
        }

        let now = Instant::now();
        let mut tiers = self.tiers.write();
        for (key, value) in entries {
            self.put_locked(&mut tiers, key, value, now);
        }
        Ok(())
    }

    /// Remove a key from both tiers and drop any pin on it
    ///
    /// # Arguments
    /// * `key` - Key to remove
    ///
    /// # Returns
    /// * `Result<Option<V>>` - The removed value, if one was cached
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        check_key(key, "remove")?;
        let now = Instant::now();
        let mut tiers = self.tiers.write();

        tiers.pins.unpin(key);
        let from_primary = tiers.primary.remove(key);
        let from_overflow = self.take_overflow(&mut tiers.overflow, key, now);
        Ok(from_primary.or(from_overflow))
    }

    /// Pin a key so capacity eviction never removes it.
    ///
    /// The pin is recorded whether or not the key is cached, so a later
    /// `put` creates the entry pinned. An overflow entry is promoted to the
    /// primary tier.
    ///
    /// # Arguments
    /// * `key` - Key to pin
    ///
    /// # Returns
    /// * `Result<bool>` - True if the key was cached in either tier
    pub fn pin(&self, key: K) -> Result<bool> {
        check_key(&key, "pin")?;
        let now = Instant::now();
        let mut tiers = self.tiers.write();

        let present = if tiers.primary.set_pinned(&key, true) {
            true
        } else if let Some(value) = self.take_overflow(&mut tiers.overflow, &key, now) {
            trace!("promoting pinned entry from overflow tier");
            self.stats.record_promotion();
            tiers.primary.insert(key.clone(), value, true);
            true
        } else {
            false
        };

        tiers.pins.pin(key);
        Ok(present)
    }

    /// Drop the pin on a key.
    ///
    /// The entry stays cached at the most recent end of the primary tier.
    ///
    /// # Arguments
    /// * `key` - Key to unpin
    ///
    /// # Returns
    /// * `Result<bool>` - True if the key was pinned
    pub fn unpin(&self, key: &K) -> Result<bool> {
        check_key(key, "unpin")?;
        let now = Instant::now();
        let mut tiers = self.tiers.write();

        let was_pinned = tiers.pins.unpin(key);
        if tiers.primary.set_pinned(key, false) {
            self.enforce_capacity(&mut tiers, now);
        }
        Ok(was_pinned)
    }

    /// Whether the key is pinned, cached or not
    pub fn is_pinned(&self, key: &K) -> Result<bool> {
        check_key(key, "is_pinned")?;
        Ok(self.tiers.read().pins.is_pinned(key))
    }

    /// Whether a live entry exists in either tier. Does not touch or promote.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        check_key(key, "contains_key")?;
        let now = Instant::now();
        let tiers = self.tiers.read();
        Ok(tiers.primary.contains(key) || tiers.overflow.contains(key, now))
    }

    /// Read a value without touching or promoting it
    pub fn peek(&self, key: &K) -> Result<Option<V>> {
        check_key(key, "peek")?;
        let now = Instant::now();
        let tiers = self.tiers.read();
        Ok(tiers
            .primary
            .peek(key)
            .or_else(|| tiers.overflow.lookup(key, now))
            .cloned())
    }

    /// Entries across both tiers at this instant
    pub fn size(&self) -> usize {
        let now = Instant::now();
        let tiers = self.tiers.read();
        tiers.primary.len() + tiers.overflow.live_len(now)
    }

    /// Same as [`Self::size`]
    pub fn len(&self) -> usize {
        self.size()
    }

    /// True when neither tier holds a live entry
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Primary keys (most recent first, pinned last), then overflow keys
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        let tiers = self.tiers.read();
        let mut keys = tiers.primary.keys();
        keys.extend(tiers.overflow.live_keys(now));
        keys
    }

    /// Every pinned key, including pins on keys not yet cached
    pub fn pinned_keys(&self) -> Vec<K> {
        self.tiers.read().pins.keys()
    }

    /// Empty both tiers and the pin registry, and reset statistics
    pub fn clear(&self) {
        let mut tiers = self.tiers.write();
        tiers.primary.clear();
        tiers.overflow.clear();
        let pins = tiers.pins.len();
        tiers.pins.clear();
        self.stats.reset();
        debug!(pins, "cache cleared");
    }

    /// Resize the primary tier, evicting at once if it shrank
    pub fn set_cache_size(&self, cache_size: Option<usize>) {
        let now = Instant::now();
        let mut tiers = self.tiers.write();
        debug!(?cache_size, "resizing primary tier");
        tiers.primary.set_capacity(cache_size);
        self.enforce_capacity(&mut tiers, now);
    }

    /// Resize the overflow tier, dropping the oldest entries if it shrank
    pub fn set_soft_size(&self, soft_size: Option<usize>) {
        let mut tiers = self.tiers.write();
        debug!(?soft_size, "resizing overflow tier");
        let displaced = tiers.overflow.set_soft_size(soft_size);
        self.notify_reclaimed(displaced);
    }

    /// Sweep expired overflow entries now. Returns how many were dropped.
    pub fn purge_reclaimed(&self) -> usize {
        let now = Instant::now();
        let mut tiers = self.tiers.write();
        let expired = tiers.overflow.purge(now);
        let count = expired.len();
        self.notify_reclaimed(expired);
        count
    }

    /// Current primary tier capacity
    pub fn cache_size(&self) -> Option<usize> {
        self.tiers.read().primary.capacity()
    }

    /// Current overflow tier bound
    pub fn soft_size(&self) -> Option<usize> {
        self.tiers.read().overflow.soft_size()
    }

    /// True for access order, false for insertion order
    pub fn is_lru(&self) -> bool {
        self.lru
    }

    /// The advisory concurrency hint from the configuration
    pub fn concurrency_hint(&self) -> Option<usize> {
        self.concurrency_hint
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn put_locked(&self, tiers: &mut Tiers<K, V>, key: K, value: V, now: Instant) -> Option<V> {
        if tiers.primary.contains(&key) {
            return tiers.primary.insert(key, value, false);
        }

        // The overflow copy is superseded; the tiers never both hold a key
        let previous = self.take_overflow(&mut tiers.overflow, &key, now);
        let pinned = tiers.pins.is_pinned(&key);
        tiers.primary.insert(key, value, pinned);
        self.stats.record_insert();
        self.enforce_capacity(tiers, now);
        previous
    }

    /// Evict from the primary tier until it is within capacity, offering
    /// each evicted entry to the overflow tier
    fn enforce_capacity(&self, tiers: &mut Tiers<K, V>, now: Instant) {
        let Tiers {
            primary, overflow, ..
        } = tiers;
        let mut dropped = Vec::new();

        let evicted = primary.evict_overflow(|key, value| {
            if let Some(listener) = &self.listener {
                listener.on_evicted(&key, &value);
            }
            let admissible = self
                .overflow_filter
                .as_ref()
                .map_or(true, |filter| filter(&key, &value));
            if !admissible {
                dropped.push(key);
                return;
            }
            match overflow.offer(key, value, now) {
                Admission::Refused(key) => dropped.push(key),
                Admission::Admitted { displaced } => dropped.extend(displaced),
            }
        });

        if evicted > 0 {
            trace!(
                evicted,
                unpinned = primary.unpinned_len(),
                "evicted from primary tier"
            );
            self.stats.record_evictions(evicted);
        }
        self.notify_reclaimed(dropped);
    }

    /// Take a key out of the overflow tier, reporting it if it had expired
    fn take_overflow(&self, overflow: &mut ReclaimableStore<K, V>, key: &K, now: Instant) -> Option<V> {
        match overflow.promote(key, now) {
            Promotion::Live(value) => Some(value),
            Promotion::Expired => {
                self.notify_reclaimed(vec![key.clone()]);
                None
            }
            Promotion::Absent => None,
        }
    }

    fn notify_reclaimed(&self, keys: Vec<K>) {
        if keys.is_empty() {
            return;
        }
        trace!(count = keys.len(), "overflow tier dropped entries");
        self.stats.record_reclaimed(keys.len());
        if let Some(listener) = &self.listener {
            for key in &keys {
                listener.on_reclaimed(key);
            }
        }
    }
}

fn check_key<K: CacheKey>(key: &K, op: &str) -> Result<()> {
    if key.is_valid() {
        Ok(())
    } else {
        Err(Error::invalid_key(op))
    }
}
