//! # Memory pressure
//!
//! Process-wide registry of cache reclaimers, indexed by name.
//!
//! A garbage-collected runtime reclaims soft values across every cache at
//! once. This registry gives an application the same reach: register each
//! cache's [`Reclaimer`] under a name, then call [`reclaim_all`] or
//! [`relieve`] from a single memory-pressure hook.
//!
//! The registry holds weak references, so a dropped cache simply disappears
//! from it.
//!
//! # Examples
//!
//! ```
//! use softcache_core::{pressure, DefaultCachingPolicy, SoftCache};
//!
//! let policy = DefaultCachingPolicy::new(1.0, 0, 0, 0).unwrap();
//! let mut sessions: SoftCache<u64, String> = SoftCache::with_policy(policy);
//! sessions.insert(1, "alice".to_string());
//! sessions.insert(2, "bob".to_string());
//!
//! pressure::register("doc_sessions", &sessions.reclaimer());
//! assert!(pressure::list().contains(&"doc_sessions".to_string()));
//!
//! // Allocation failed somewhere: drop half of every registered cache
//! let dropped = pressure::relieve(0.5);
//! assert!(dropped >= 1);
//!
//! pressure::unregister("doc_sessions");
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Weak;
use tracing::debug;

use crate::reclaim::{Reclaim, Reclaimer};

static PRESSURE_REGISTRY: Lazy<RwLock<HashMap<String, Weak<dyn Reclaim>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a reclaimer under `name`, replacing any previous registration.
///
/// Only a weak reference is kept.
pub fn register<K, V>(name: &str, reclaimer: &Reclaimer<K, V>)
where
    K: Send + 'static,
    V: Send + Sync + 'static,
{
    let mut registry = PRESSURE_REGISTRY.write();
    registry.insert(name.to_string(), reclaimer.downgrade());
    debug!(name, "registered reclaimer");
}

/// Remove the registration for `name`.
///
/// # Returns
///
/// * `true` - If a registration existed
/// * `false` - Otherwise
pub fn unregister(name: &str) -> bool {
    let mut registry = PRESSURE_REGISTRY.write();
    registry.remove(name).is_some()
}

/// Names of all registrations whose cache is still alive.
///
/// Registrations of dropped caches are pruned as a side effect.
pub fn list() -> Vec<String> {
    let mut registry = PRESSURE_REGISTRY.write();
    registry.retain(|_, weak| weak.strong_count() > 0);
    registry.keys().cloned().collect()
}

/// Reclaim everything held by the reclaimer registered as `name`.
///
/// # Returns
///
/// * `Some(n)` - Number of values reclaimed
/// * `None` - If no live registration exists under that name
pub fn reclaim(name: &str) -> Option<usize> {
    let reclaimer = {
        let registry = PRESSURE_REGISTRY.read();
        registry.get(name)?.upgrade()?
    };
    Some(reclaimer.reclaim_all())
}

/// Reclaim everything held by every registered reclaimer.
pub fn reclaim_all() -> usize {
    let total: usize = live_reclaimers().iter().map(|r| r.reclaim_all()).sum();
    debug!(reclaimed = total, "pressure: reclaimed all registered caches");
    total
}

/// Reclaim a fraction of every registered reclaimer's held values, oldest
/// first. `fraction` is clamped to `[0, 1]`; each cache gives up
/// `ceil(held * fraction)` values.
pub fn relieve(fraction: f64) -> usize {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let total: usize = live_reclaimers()
        .iter()
        .map(|r| {
            let target = (r.held() as f64 * fraction).ceil() as usize;
            r.reclaim_oldest(target)
        })
        .sum();
    debug!(fraction, reclaimed = total, "pressure: relieved registered caches");
    total
}

/// Remove all registrations. Does not reclaim anything.
pub fn clear() {
    let mut registry = PRESSURE_REGISTRY.write();
    registry.clear();
}

// Upgrade outside of the reclaim calls so no registry lock is held while
// reclaimers lock their own state.
fn live_reclaimers() -> Vec<std::sync::Arc<dyn Reclaim>> {
    let registry = PRESSURE_REGISTRY.read();
    registry.values().filter_map(|weak| weak.upgrade()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DefaultCachingPolicy, SoftCache};
    use serial_test::serial;

    fn reclaimable_cache(n: u32) -> SoftCache<u32, u32> {
        let policy = DefaultCachingPolicy::new(1.0, 0, 0, 0).unwrap();
        let mut cache = SoftCache::with_policy(policy);
        for i in 0..n {
            cache.insert(i, i);
        }
        cache
    }

    #[test]
    #[serial]
    fn test_register_and_reclaim_by_name() {
        clear();
        let mut cache = reclaimable_cache(3);
        register("test_cache", &cache.reclaimer());

        assert_eq!(reclaim("test_cache"), Some(3));
        assert_eq!(reclaim("missing"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    #[serial]
    fn test_dropped_cache_is_pruned() {
        clear();
        {
            let cache = reclaimable_cache(1);
            register("short_lived", &cache.reclaimer());
            assert_eq!(list(), vec!["short_lived".to_string()]);
        }
        assert!(list().is_empty());
        assert_eq!(reclaim("short_lived"), None);
    }

    #[test]
    #[serial]
    fn test_reclaim_all_across_caches() {
        clear();
        let mut first = reclaimable_cache(2);
        let mut second = reclaimable_cache(4);
        register("first", &first.reclaimer());
        register("second", &second.reclaimer());

        assert_eq!(reclaim_all(), 6);
        assert!(first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    #[serial]
    fn test_relieve_takes_a_fraction() {
        clear();
        let mut cache = reclaimable_cache(4);
        register("fraction", &cache.reclaimer());

        assert_eq!(relieve(0.5), 2);
        assert_eq!(cache.len(), 2);
        // ceil(2 * 0.1) = 1
        assert_eq!(relieve(0.1), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(relieve(f64::NAN), 0);
    }

    #[test]
    #[serial]
    fn test_unregister_and_clear() {
        clear();
        let cache = reclaimable_cache(1);
        register("a", &cache.reclaimer());
        register("b", &cache.reclaimer());

        assert!(unregister("a"));
        assert!(!unregister("a"));
        assert_eq!(list(), vec!["b".to_string()]);

        clear();
        assert!(list().is_empty());
    }
}
