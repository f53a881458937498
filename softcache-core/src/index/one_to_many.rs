use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::{CacheIndex, IndexId};
use crate::{BackingMap, CachingPolicy, Slot, SoftCache};

type Extractor<V, A> = Arc<dyn Fn(&V) -> A + Send + Sync>;

/// Index mapping each attribute value to the group of keys holding it.
///
/// Groups keep insertion order and never contain the same key twice. An
/// emptied group is dropped.
///
/// # Examples
///
/// ```
/// use softcache_core::{OneToManyIndex, SoftCache};
///
/// let mut words: SoftCache<u32, String> = SoftCache::new();
/// let by_len = OneToManyIndex::new(|w: &String| w.len());
/// words.add_index(&by_len);
///
/// words.insert(1, "ant".to_string());
/// words.insert(2, "bee".to_string());
/// words.insert(3, "wasp".to_string());
///
/// let three: Vec<String> = by_len
///     .get(&mut words, &3)
///     .iter()
///     .map(|w| w.to_string())
///     .collect();
/// assert_eq!(three, vec!["ant", "bee"]);
///
/// assert_eq!(by_len.remove(&mut words, &3).len(), 2);
/// assert_eq!(words.len(), 1);
/// ```
pub struct OneToManyIndex<K, V, A> {
    id: IndexId,
    extractor: Extractor<V, A>,
    groups: Arc<Mutex<HashMap<A, Vec<K>>>>,
}

impl<K, V, A> Clone for OneToManyIndex<K, V, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            extractor: Arc::clone(&self.extractor),
            groups: Arc::clone(&self.groups),
        }
    }
}

impl<K, V, A> OneToManyIndex<K, V, A>
where
    K: Clone + PartialEq,
    A: Hash + Eq,
{
    /// Creates an empty index over the attribute computed by `extractor`.
    pub fn new<F>(extractor: F) -> Self
    where
        F: Fn(&V) -> A + Send + Sync + 'static,
    {
        Self {
            id: IndexId::next(),
            extractor: Arc::new(extractor),
            groups: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    /// Keys recorded for `attribute`, in insertion order.
    pub fn keys(&self, attribute: &A) -> Vec<K> {
        self.groups
            .lock()
            .get(attribute)
            .cloned()
            .unwrap_or_default()
    }

    /// Values of every key recorded for `attribute`, in insertion order.
    ///
    /// The group is copied before any value is read: each read goes through
    /// [`SoftCache::get`] and may expunge a reclaimed entry, which edits the
    /// group. Expunged keys are simply left out.
    pub fn get<M, P>(&self, cache: &mut SoftCache<K, V, M, P>, attribute: &A) -> Vec<Arc<V>>
    where
        M: BackingMap<K, Slot>,
        P: CachingPolicy,
    {
        self.keys(attribute)
            .iter()
            .filter_map(|key| cache.get(key))
            .collect()
    }

    /// Removes every entry recorded for `attribute` from the cache and
    /// returns the values that were still alive.
    ///
    /// The group is detached first, so the removal notifications the cache
    /// sends back for these keys find nothing left to edit.
    pub fn remove<M, P>(&self, cache: &mut SoftCache<K, V, M, P>, attribute: &A) -> Vec<Arc<V>>
    where
        M: BackingMap<K, Slot>,
        P: CachingPolicy,
    {
        let group = self.groups.lock().remove(attribute).unwrap_or_default();
        group.iter().filter_map(|key| cache.remove(key)).collect()
    }

    /// Number of attribute values with at least one key.
    pub fn len(&self) -> usize {
        self.groups.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.lock().is_empty()
    }

    pub fn clear(&self) {
        self.groups.lock().clear();
    }
}

impl<K, V, A> CacheIndex<K, V> for OneToManyIndex<K, V, A>
where
    K: Clone + PartialEq + Send,
    A: Hash + Eq + Send,
{
    fn id(&self) -> IndexId {
        self.id
    }

    fn add_to_index(&self, key: &K, value: &V) {
        let attribute = (self.extractor)(value);
        let mut groups = self.groups.lock();
        let group = groups.entry(attribute).or_default();
        if !group.contains(key) {
            group.push(key.clone());
        }
    }

    fn remove_from_index(&self, key: &K, value: Option<&V>) {
        let mut groups = self.groups.lock();
        match value {
            Some(value) => {
                let attribute = (self.extractor)(value);
                if let Some(group) = groups.get_mut(&attribute) {
                    group.retain(|recorded| recorded != key);
                    if group.is_empty() {
                        groups.remove(&attribute);
                    }
                }
            }
            None => groups.retain(|_, group| {
                group.retain(|recorded| recorded != key);
                !group.is_empty()
            }),
        }
    }

    fn clear(&self) {
        OneToManyIndex::clear(self)
    }
}

impl<K, V, A> fmt::Debug for OneToManyIndex<K, V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneToManyIndex")
            .field("id", &self.id)
            .field("groups", &self.groups.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefaultCachingPolicy;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        category: char,
    }

    fn item(name: &'static str, category: char) -> Item {
        Item { name, category }
    }

    fn setup() -> (SoftCache<u32, Item>, OneToManyIndex<u32, Item, char>) {
        let policy = DefaultCachingPolicy::new(0.0, 0, 0, 0).unwrap();
        let mut cache = SoftCache::with_policy(policy);
        let index = OneToManyIndex::new(|i: &Item| i.category);
        cache.add_index(&index);
        (cache, index)
    }

    fn names(values: Vec<Arc<Item>>) -> Vec<&'static str> {
        values.iter().map(|i| i.name).collect()
    }

    #[test]
    fn test_groups_keep_insertion_order() {
        let (mut cache, index) = setup();
        cache.insert(3, item("c", 'A'));
        cache.insert(1, item("a", 'A'));
        cache.insert(2, item("b", 'B'));

        assert_eq!(index.keys(&'A'), vec![3, 1]);
        assert_eq!(names(index.get(&mut cache, &'A')), vec!["c", "a"]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_overwrite_moves_key_between_groups() {
        let (mut cache, index) = setup();
        cache.insert(1, item("a", 'A'));
        cache.insert(1, item("a", 'B'));

        assert!(index.keys(&'A').is_empty());
        assert_eq!(index.keys(&'B'), vec![1]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_get_skips_reclaimed_keys() {
        let (mut cache, index) = setup();
        cache.insert(1, item("a", 'A'));
        cache.insert(2, item("b", 'A'));
        cache.insert(3, item("c", 'A'));

        let reclaimer = cache.reclaimer();
        reclaimer.reclaim_key(&2);

        assert_eq!(names(index.get(&mut cache, &'A')), vec!["a", "c"]);
        assert_eq!(index.keys(&'A'), vec![1, 3]);
    }

    #[test]
    fn test_reclaimed_keys_are_found_without_their_value() {
        let (mut cache, index) = setup();
        cache.insert(1, item("a", 'A'));
        cache.insert(2, item("b", 'B'));

        cache.reclaimer().reclaim_key(&2);
        assert_eq!(cache.len(), 1);
        assert!(index.keys(&'B').is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_whole_group() {
        let (mut cache, index) = setup();
        cache.insert(1, item("a", 'A'));
        cache.insert(2, item("b", 'A'));
        cache.insert(3, item("c", 'B'));

        assert_eq!(names(index.remove(&mut cache, &'A')), vec!["a", "b"]);
        assert_eq!(cache.len(), 1);
        assert!(index.keys(&'A').is_empty());
        assert_eq!(index.keys(&'B'), vec![3]);
        assert!(index.remove(&mut cache, &'A').is_empty());
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_index_then_add_index_rebuilds() {
        let (mut cache, index) = setup();
        cache.insert(1, item("a", 'A'));
        cache.insert(2, item("b", 'B'));

        assert!(cache.remove_index(&index));
        assert!(!cache.remove_index(&index));
        // Unregistered: contents stay, notifications stop
        cache.insert(3, item("c", 'A'));
        assert_eq!(index.keys(&'A'), vec![1]);

        index.clear();
        assert!(cache.add_index(&index));
        let mut rebuilt = index.keys(&'A');
        rebuilt.sort();
        assert_eq!(rebuilt, vec![1, 3]);
    }
}
