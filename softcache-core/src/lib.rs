//! # Softcache Core
//!
//! Core types of the Softcache library: a memory-adaptive associative cache.
//!
//! Every cached value is held either **strongly** or **reclaimably**. A
//! caching policy picks the mode of each new value and keeps rebalancing the
//! two populations as values are read and removed, steering towards a target
//! fraction of reclaimable values ("softness"). Reclaimable values can be
//! dropped at any time through the cache's [`Reclaimer`]; the cache notices
//! lazily and keeps its counters and secondary indices consistent.
//!
//! ## Features
//!
//! - **Two-tier retention**: strong and reclaimable cells, see [`Retention`]
//! - **Adaptive policy**: [`DefaultCachingPolicy`] with softness and strong-count bounds
//! - **Explicit reclamation**: [`Reclaimer`] handles and the process-wide [`pressure`] registry
//! - **Secondary indices**: [`OneToOneIndex`] and [`OneToManyIndex`], kept in sync automatically
//! - **Pluggable backing map**: any [`BackingMap`], `HashMap` by default
//! - **Statistics**: hit/miss and retention churn counters (with `stats` feature)
//!
//! ## Module Organization
//!
//! - [`retention`] - Retention modes and per-mode counts
//! - [`reclaim`] - Reclaimer handles and reclamation notifications
//! - [`policy`] - The caching policy trait and the default policy
//! - [`cursor`] - Removal-capable iteration
//! - [`index`] - Secondary indices
//! - [`pressure`] - Global registry of reclaimers
//!
//! ## Example
//!
//! ```
//! use softcache_core::{DefaultCachingPolicy, Retention, SoftCache};
//!
//! // Half the values reclaimable, at most 1000 strong ones
//! let policy = DefaultCachingPolicy::new(0.5, 0, 0, 1_000).unwrap();
//! let mut cache: SoftCache<String, Vec<u8>> = SoftCache::with_policy(policy);
//!
//! cache.insert("a".to_string(), vec![1; 1024]);
//! cache.insert("b".to_string(), vec![2; 1024]);
//! assert_eq!(cache.retention(&"a".to_string()), Ok(Some(Retention::Reclaimable)));
//!
//! // Memory is tight: drop every reclaimable value
//! cache.reclaimer().reclaim_all();
//! assert_eq!(cache.len(), 1);
//! ```
mod backing;
mod cell;
mod error;
mod shared;
mod store;
mod tracker;

pub mod cursor;
pub mod index;
pub mod policy;
pub mod pressure;
pub mod reclaim;
pub mod retention;

#[cfg(feature = "stats")]
mod stats;

pub use backing::{BackingMap, Slot};
pub use cell::{CellId, RetentionCell};
pub use cursor::{Cursor, CursorState, Entries, Keys, Values};
pub use error::{CacheError, Result};
pub use index::{CacheIndex, IndexId, OneToManyIndex, OneToOneIndex};
pub use policy::{CachingPolicy, DefaultCachingPolicy, PolicyConfig, Rebalance};
pub use reclaim::{Reclaim, Reclaimer};
pub use retention::{Retention, RetentionCounts};
pub use shared::SharedSoftCache;
pub use store::SoftCache;
pub use tracker::UsageTracker;

#[cfg(feature = "stats")]
pub use stats::CacheStats;
