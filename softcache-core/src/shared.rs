use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::{BackingMap, CachingPolicy, DefaultCachingPolicy, Reclaimer, Slot, SoftCache};

/// A [`SoftCache`] behind one coarse-grained lock, shareable across threads.
///
/// The cache, its policy and its indices form a single unit without internal
/// locking; this wrapper serializes every operation on that unit with a
/// `parking_lot::Mutex`. Clones share the same cache.
///
/// Index lookups need the cache itself, so go through [`lock`](Self::lock):
///
/// ```
/// use softcache_core::{OneToOneIndex, SharedSoftCache, SoftCache};
///
/// let shared = SharedSoftCache::new(SoftCache::<u32, String>::new());
/// let by_value = OneToOneIndex::new(|v: &String| v.clone());
/// shared.lock().add_index(&by_value);
///
/// let worker = shared.clone();
/// std::thread::spawn(move || {
///     worker.insert(1, "one".to_string());
/// })
/// .join()
/// .unwrap();
///
/// let mut cache = shared.lock();
/// assert!(by_value.get(&mut cache, &"one".to_string()).is_some());
/// ```
///
/// # Thread Safety
///
/// The [`Reclaimer`] returned by [`reclaimer`](Self::reclaimer) does not need
/// the lock: reclaiming from another thread never blocks cache users.
pub struct SharedSoftCache<K, V, M = HashMap<K, Slot>, P = DefaultCachingPolicy> {
    inner: Arc<Mutex<SoftCache<K, V, M, P>>>,
}

impl<K, V, M, P> Clone for SharedSoftCache<K, V, M, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for SharedSoftCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new(SoftCache::new())
    }
}

impl<K, V, M, P> SharedSoftCache<K, V, M, P>
where
    K: Clone,
    M: BackingMap<K, Slot>,
    P: CachingPolicy,
{
    pub fn new(cache: SoftCache<K, V, M, P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Locks the cache for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, SoftCache<K, V, M, P>> {
        self.inner.lock()
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().get(key)
    }

    pub fn put(&self, key: K, value: Option<V>) -> Option<Arc<V>> {
        self.inner.lock().put(key, value)
    }

    pub fn insert(&self, key: K, value: V) -> Option<Arc<V>> {
        self.inner.lock().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    /// Returns the value for `key`, computing and storing it on a miss.
    ///
    /// The lock is held while `compute` runs, so concurrent callers for the
    /// same key compute once. A stored null counts as a miss here.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let mut cache = self.inner.lock();
        if let Some(value) = cache.get(&key) {
            return value;
        }
        let value = Arc::new(compute());
        cache.put_shared(key, Arc::clone(&value));
        value
    }

    /// A handle on the cache's reclaimer. Usable without the lock.
    pub fn reclaimer(&self) -> Reclaimer<K, V> {
        self.inner.lock().reclaimer()
    }
}

impl<K, V> From<SoftCache<K, V>> for SharedSoftCache<K, V>
where
    K: Clone + Hash + Eq,
{
    fn from(cache: SoftCache<K, V>) -> Self {
        Self::new(cache)
    }
}
