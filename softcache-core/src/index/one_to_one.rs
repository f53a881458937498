use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::{CacheIndex, IndexId};
use crate::{BackingMap, CachingPolicy, Slot, SoftCache};

type Extractor<V, A> = Arc<dyn Fn(&V) -> A + Send + Sync>;

/// Index mapping each attribute value to a single key.
///
/// When two values share an attribute, the later write wins and the earlier
/// key silently drops out of the index. Removal is by key: the index scans
/// its records unless the removed value leads straight to the record.
///
/// # Examples
///
/// ```
/// use softcache_core::{OneToOneIndex, SoftCache};
///
/// struct User {
///     email: String,
/// }
///
/// let mut users: SoftCache<u32, User> = SoftCache::new();
/// let by_email = OneToOneIndex::new(|u: &User| u.email.clone());
/// users.add_index(&by_email);
///
/// users.insert(7, User { email: "ann@example.com".into() });
///
/// let found = by_email.get(&mut users, &"ann@example.com".to_string());
/// assert_eq!(found.map(|u| u.email.clone()).as_deref(), Some("ann@example.com"));
/// assert_eq!(by_email.key(&"ann@example.com".to_string()), Some(7));
/// ```
pub struct OneToOneIndex<K, V, A> {
    id: IndexId,
    extractor: Extractor<V, A>,
    entries: Arc<Mutex<HashMap<A, K>>>,
}

impl<K, V, A> Clone for OneToOneIndex<K, V, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            extractor: Arc::clone(&self.extractor),
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V, A> OneToOneIndex<K, V, A>
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
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    /// The key currently recorded for `attribute`.
    pub fn key(&self, attribute: &A) -> Option<K> {
        self.entries.lock().get(attribute).cloned()
    }

    /// Looks up the value whose attribute is `attribute`.
    ///
    /// Goes through [`SoftCache::get`], so a hit counts as a use.
    pub fn get<M, P>(&self, cache: &mut SoftCache<K, V, M, P>, attribute: &A) -> Option<Arc<V>>
    where
        M: BackingMap<K, Slot>,
        P: CachingPolicy,
    {
        let key = self.key(attribute)?;
        cache.get(&key)
    }

    /// Removes the entry whose attribute is `attribute` from the cache.
    ///
    /// The cache's own notification removes the record.
    pub fn remove<M, P>(&self, cache: &mut SoftCache<K, V, M, P>, attribute: &A) -> Option<Arc<V>>
    where
        M: BackingMap<K, Slot>,
        P: CachingPolicy,
    {
        let key = self.key(attribute)?;
        let removed = cache.remove(&key);
        // Not registered, or the cache was cleared under us
        let mut entries = self.entries.lock();
        if entries.get(attribute) == Some(&key) {
            entries.remove(attribute);
        }
        removed
    }

    /// Number of attribute values recorded.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<K, V, A> CacheIndex<K, V> for OneToOneIndex<K, V, A>
where
    K: Clone + PartialEq + Send,
    A: Hash + Eq + Send,
{
    fn id(&self) -> IndexId {
        self.id
    }

    fn add_to_index(&self, key: &K, value: &V) {
        let attribute = (self.extractor)(value);
        self.entries.lock().insert(attribute, key.clone());
    }

    fn remove_from_index(&self, key: &K, value: Option<&V>) {
        let mut entries = self.entries.lock();
        if let Some(value) = value {
            let attribute = (self.extractor)(value);
            if entries.get(&attribute) == Some(key) {
                entries.remove(&attribute);
                return;
            }
        }
        entries.retain(|_, recorded| recorded != key);
    }

    fn clear(&self) {
        OneToOneIndex::clear(self)
    }
}

impl<K, V, A> fmt::Debug for OneToOneIndex<K, V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneToOneIndex")
            .field("id", &self.id)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}
