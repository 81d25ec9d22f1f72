//! Hooks for observing entries leaving the cache

/// Callbacks for entries leaving a tier without an explicit `remove`.
///
/// Both methods run while the engine lock is held. Implementations must
/// not call back into the engine.
pub trait CacheListener<K, V>: Send + Sync {
    /// An unpinned entry was pushed out of the primary tier by capacity
    fn on_evicted(&self, _key: &K, _value: &V) {}

    /// The overflow tier dropped (or refused to hold) an entry
    fn on_reclaimed(&self, _key: &K) {}
}
