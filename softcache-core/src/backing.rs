use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::CellId;

/// What a cache stores per key: the cell id, or `None` for a stored null.
///
/// Keeping nulls as "no cell" is what lets the cache tell a stored null
/// apart from a value that was reclaimed.
pub type Slot = Option<CellId>;

/// Associative container a [`SoftCache`](crate::SoftCache) keeps its slots in.
///
/// Chosen at compile time through the cache's `M` type parameter. Any
/// implementation must accept arbitrary keys and be constructible on its own
/// (`Default`).
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use softcache_core::{DefaultCachingPolicy, Slot, SoftCache};
///
/// // Ordered backing map: iteration and Display follow key order
/// let mut cache: SoftCache<u32, &str, BTreeMap<u32, Slot>> =
///     SoftCache::with_policy(DefaultCachingPolicy::new(0.0, 0, 0, usize::MAX).unwrap());
/// cache.insert(2, "two");
/// cache.insert(1, "one");
/// assert_eq!(cache.to_string(), "{1=one, 2=two}");
/// ```
pub trait BackingMap<K, S>: Default {
    fn get(&self, key: &K) -> Option<&S>;

    fn insert(&mut self, key: K, slot: S) -> Option<S>;

    fn remove(&mut self, key: &K) -> Option<S>;

    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Iterates over all entries in the container's own order.
    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a K, &'a S)> + 'a>;
}

impl<K, S, H> BackingMap<K, S> for HashMap<K, S, H>
where
    K: Hash + Eq,
    H: BuildHasher + Default,
{
    fn get(&self, key: &K) -> Option<&S> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: K, slot: S) -> Option<S> {
        HashMap::insert(self, key, slot)
    }

    fn remove(&mut self, key: &K) -> Option<S> {
        HashMap::remove(self, key)
    }

    fn contains_key(&self, key: &K) -> bool {
        HashMap::contains_key(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn clear(&mut self) {
        HashMap::clear(self)
    }

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a K, &'a S)> + 'a> {
        Box::new(HashMap::iter(self))
    }
}

impl<K, S> BackingMap<K, S> for BTreeMap<K, S>
where
    K: Ord,
{
    fn get(&self, key: &K) -> Option<&S> {
        BTreeMap::get(self, key)
    }

    fn insert(&mut self, key: K, slot: S) -> Option<S> {
        BTreeMap::insert(self, key, slot)
    }

    fn remove(&mut self, key: &K) -> Option<S> {
        BTreeMap::remove(self, key)
    }

    fn contains_key(&self, key: &K) -> bool {
        BTreeMap::contains_key(self, key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn clear(&mut self) {
        BTreeMap::clear(self)
    }

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a K, &'a S)> + 'a> {
        Box::new(BTreeMap::iter(self))
    }
}
