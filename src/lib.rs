//! # Softcache
//!
//! A memory-adaptive associative cache for Rust.
//!
//! Values are held either strongly or reclaimably. A caching policy decides
//! which, rebalancing as values are read and removed, and the application
//! decides when reclaimable values are actually dropped.
//!
//! ## Features
//!
//! - **Two-tier retention**: strong values stay until removed, reclaimable ones go on request
//! - **Adaptive balance**: the default policy steers towards a target fraction of reclaimable values
//! - **Consistent indices**: secondary indices follow every insert, removal and reclamation
//! - **Thread-safe sharing**: `SharedSoftCache` wraps a cache in a `parking_lot::Mutex`
//! - **Statistics**: hit/miss and retention churn counters (with `stats` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use softcache::{DefaultCachingPolicy, SoftCache};
//!
//! let policy = DefaultCachingPolicy::new(0.25, 0, 0, 10_000).unwrap();
//! let mut cache: SoftCache<u64, String> = SoftCache::with_policy(policy);
//!
//! cache.insert(1, "one".to_string());
//! cache.put(2, None);
//!
//! assert_eq!(cache.get(&1).as_deref().map(String::as_str), Some("one"));
//! assert!(cache.contains_key(&2));
//! assert_eq!(cache.get(&2), None);
//! ```
//!
//! ## Reclaiming Under Pressure
//!
//! Nothing is ever dropped behind the application's back. Register caches by
//! name and call [`reclaim_all_caches`] or [`relieve_memory_pressure`] from
//! whatever signals memory pressure in your program:
//!
//! ```rust
//! use softcache::{pressure, relieve_memory_pressure, DefaultCachingPolicy, SoftCache};
//!
//! let mut thumbnails: SoftCache<u32, Vec<u8>> =
//!     SoftCache::with_policy(DefaultCachingPolicy::new(1.0, 0, 0, 0).unwrap());
//! for id in 0..8 {
//!     thumbnails.insert(id, vec![0; 4096]);
//! }
//! pressure::register("facade_thumbnails", &thumbnails.reclaimer());
//!
//! // Give up a quarter of every registered cache, oldest values first
//! assert!(relieve_memory_pressure(0.25) >= 2);
//! assert!(thumbnails.len() <= 6);
//!
//! pressure::unregister("facade_thumbnails");
//! ```
//!
//! ## Secondary Indices
//!
//! ```rust
//! use softcache::{OneToManyIndex, SoftCache};
//!
//! struct Order {
//!     customer: u32,
//! }
//!
//! let mut orders: SoftCache<u64, Order> = SoftCache::new();
//! let by_customer = OneToManyIndex::new(|o: &Order| o.customer);
//! orders.add_index(&by_customer);
//!
//! orders.insert(100, Order { customer: 7 });
//! orders.insert(101, Order { customer: 7 });
//! assert_eq!(by_customer.keys(&7), vec![100, 101]);
//! ```

pub use softcache_core::*;

/// Reclaim every reclaimable value of every registered cache
///
/// # Returns
///
/// The number of values reclaimed
///
/// # Examples
///
/// ```rust
/// use softcache::reclaim_all_caches;
///
/// // Allocation failed: drop everything that can be dropped
/// reclaim_all_caches();
/// ```
pub fn reclaim_all_caches() -> usize {
    pressure::reclaim_all()
}

/// Reclaim a fraction of every registered cache's reclaimable values
///
/// Each cache gives up its oldest reclaimable values first.
///
/// # Arguments
///
/// * `fraction` - Share of reclaimable values to drop, clamped to `[0, 1]`
///
/// # Returns
///
/// The number of values reclaimed
pub fn relieve_memory_pressure(fraction: f64) -> usize {
    pressure::relieve(fraction)
}

/// Reclaim every reclaimable value of the cache registered as `name`
///
/// # Returns
///
/// `Some(n)` with the number of values reclaimed, or `None` if no live cache
/// is registered under that name
pub fn reclaim_cache(name: &str) -> Option<usize> {
    pressure::reclaim(name)
}
