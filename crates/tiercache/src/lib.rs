//! # tiercache
//!
//! Bounded, concurrent object cache with pinning and tiered overflow.
//!
//! ## Architecture
//! - **Primary tier**: AHash map over a slab-backed doubly-linked list,
//!   insertion or access (LRU) order, O(1) eviction
//! - **Overflow tier**: evicted entries held best-effort; they expire
//!   after `reclaim_after` or drop out past `soft_size`
//! - **Pin registry**: keys exempt from capacity eviction, pinnable
//!   before they are ever inserted
//! - **Engine**: one `parking_lot::RwLock` around all three, so every
//!   operation is linearizable

#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod key;
mod listener;
mod ordered;
mod pins;
mod reclaimable;
mod stats;

pub use config::CacheConfig;
pub use engine::CacheEngine;
pub use error::{Error, Result};
pub use key::CacheKey;
pub use listener::CacheListener;
pub use stats::CacheStats;
