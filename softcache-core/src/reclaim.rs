//! # Reclamation
//!
//! Rust has no collector that clears values under memory pressure, so the
//! cache makes reclamation explicit. Every reclaimable cell parks its value
//! with the cache's [`Reclaimer`]. Whoever owns a clone of that handle (an
//! allocation-failure hook, a periodic task, a memory-budget check, another
//! thread) decides when values are actually dropped.
//!
//! Reclaiming a value is permanent: the cell's slot is emptied and a
//! notification carrying the cell id and key is queued. The owning cache
//! drains that queue lazily at the start of its next operation and removes
//! the dead entries, exactly as it would with runtime-driven soft references.
//!
//! The difference from a garbage-collected runtime is deliberate: values are
//! reclaimed exactly when a reclaim method is called, never spontaneously.
//!
//! # Examples
//!
//! ```
//! use softcache_core::{DefaultCachingPolicy, SoftCache};
//!
//! // Every new cell is created reclaimable.
//! let policy = DefaultCachingPolicy::new(1.0, 0, 0, 0).unwrap();
//! let mut cache: SoftCache<&str, u32> = SoftCache::with_policy(policy);
//! cache.insert("a", 1);
//! cache.insert("b", 2);
//!
//! let reclaimer = cache.reclaimer();
//! assert_eq!(reclaimer.held(), 2);
//! assert_eq!(reclaimer.reclaim_all(), 2);
//!
//! // The cache notices on its next operation.
//! assert_eq!(cache.len(), 0);
//! ```

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::cell::CellId;

/// Shared storage for one reclaimable value. `None` once reclaimed.
pub(crate) type SoftSlot<V> = Arc<Mutex<Option<Arc<V>>>>;

/// Object-safe view of a reclaimer, used by the process-wide
/// [`pressure`](crate::pressure) registry.
pub trait Reclaim: Send + Sync {
    /// Number of reclaimable values currently retained.
    fn held(&self) -> usize;

    /// Reclaims up to `n` values, oldest demotion first.
    fn reclaim_oldest(&self, n: usize) -> usize;

    /// Reclaims every retained value.
    fn reclaim_all(&self) -> usize;
}

struct Held<K, V> {
    seq: u64,
    key: K,
    slot: SoftSlot<V>,
}

struct ReclaimState<K, V> {
    held: HashMap<CellId, Held<K, V>>,
    // Demotion order, one entry per held cell.
    order: BTreeMap<u64, CellId>,
    next_seq: u64,
    notifications: VecDeque<(CellId, K)>,
}

impl<K, V> ReclaimState<K, V> {
    fn new() -> Self {
        Self {
            held: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            notifications: VecDeque::new(),
        }
    }

    fn forget(&mut self, id: CellId) -> Option<Held<K, V>> {
        let held = self.held.remove(&id)?;
        self.order.remove(&held.seq);
        Some(held)
    }

    fn reclaim_cell(&mut self, id: CellId) -> bool {
        match self.forget(id) {
            Some(held) => {
                held.slot.lock().take();
                self.notifications.push_back((id, held.key));
                true
            }
            None => false,
        }
    }

    fn reclaim_oldest(&mut self, n: usize) -> usize {
        let mut reclaimed = 0;
        while reclaimed < n {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            if self.reclaim_cell(id) {
                reclaimed += 1;
            }
        }
        reclaimed
    }

    fn reclaim_random(&mut self, n: usize) -> usize {
        let mut candidates: Vec<CellId> = self.held.keys().copied().collect();
        let mut reclaimed = 0;
        while reclaimed < n && !candidates.is_empty() {
            let pos = fastrand::usize(..candidates.len());
            let id = candidates.swap_remove(pos);
            if self.reclaim_cell(id) {
                reclaimed += 1;
            }
        }
        reclaimed
    }

    fn reclaim_all(&mut self) -> usize {
        let ids: Vec<CellId> = self.order.values().copied().collect();
        let mut reclaimed = 0;
        for id in ids {
            if self.reclaim_cell(id) {
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

struct ReclaimerInner<K, V> {
    state: Mutex<ReclaimState<K, V>>,
}

impl<K, V> Reclaim for ReclaimerInner<K, V>
where
    K: Send,
    V: Send + Sync,
{
    fn held(&self) -> usize {
        self.state.lock().held.len()
    }

    fn reclaim_oldest(&self, n: usize) -> usize {
        let reclaimed = self.state.lock().reclaim_oldest(n);
        debug!(requested = n, reclaimed, "reclaimed oldest values");
        reclaimed
    }

    fn reclaim_all(&self) -> usize {
        let reclaimed = self.state.lock().reclaim_all();
        debug!(reclaimed, "reclaimed all values");
        reclaimed
    }
}

/// Handle through which reclaimable values are held and reclaimed.
///
/// Every [`SoftCache`](crate::SoftCache) owns one; [`SoftCache::reclaimer`]
/// hands out clones. Clones share state, are `Send + Sync` for
/// `K: Send, V: Send + Sync`, and may be used while the cache is borrowed
/// elsewhere, including from other threads. That is how "reclamation at any
/// point between two operations" is modelled.
///
/// # Thread Safety
///
/// All state sits behind a single `parking_lot::Mutex`. Reclaiming never
/// touches the cache itself; it only empties slots and queues notifications.
///
/// # Examples
///
/// ```
/// use softcache_core::{DefaultCachingPolicy, SoftCache};
///
/// let policy = DefaultCachingPolicy::new(1.0, 0, 0, 0).unwrap();
/// let mut cache: SoftCache<u32, String> = SoftCache::with_policy(policy);
/// for i in 0..4 {
///     cache.insert(i, format!("v{i}"));
/// }
///
/// let reclaimer = cache.reclaimer();
/// assert_eq!(reclaimer.reclaim_oldest(3), 3);
/// assert_eq!(reclaimer.pending(), 3);
///
/// assert_eq!(cache.len(), 1);
/// assert_eq!(reclaimer.pending(), 0);
/// assert!(cache.contains_key(&3));
/// ```
///
/// [`SoftCache::reclaimer`]: crate::SoftCache::reclaimer
pub struct Reclaimer<K, V> {
    inner: Arc<ReclaimerInner<K, V>>,
}

impl<K, V> Clone for Reclaimer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Reclaimer<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ReclaimerInner {
                state: Mutex::new(ReclaimState::new()),
            }),
        }
    }

    /// Number of reclaimable values currently retained.
    pub fn held(&self) -> usize {
        self.inner.state.lock().held.len()
    }

    /// Number of reclamation notifications the cache has not drained yet.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().notifications.len()
    }

    /// Reclaims every retained value. Returns how many were dropped.
    pub fn reclaim_all(&self) -> usize {
        let reclaimed = self.inner.state.lock().reclaim_all();
        debug!(reclaimed, "reclaimed all values");
        reclaimed
    }

    /// Reclaims up to `n` values, in the order they became reclaimable.
    pub fn reclaim_oldest(&self, n: usize) -> usize {
        let reclaimed = self.inner.state.lock().reclaim_oldest(n);
        debug!(requested = n, reclaimed, "reclaimed oldest values");
        reclaimed
    }

    /// Reclaims up to `n` randomly chosen values.
    pub fn reclaim_random(&self, n: usize) -> usize {
        let reclaimed = self.inner.state.lock().reclaim_random(n);
        debug!(requested = n, reclaimed, "reclaimed random values");
        reclaimed
    }

    /// Reclaims the value held for `key`, if it is currently reclaimable.
    ///
    /// Returns `false` when the key is absent, strong, or already reclaimed.
    pub fn reclaim_key(&self, key: &K) -> bool
    where
        K: PartialEq,
    {
        let mut state = self.inner.state.lock();
        let id = state
            .held
            .iter()
            .find(|(_, held)| held.key == *key)
            .map(|(id, _)| *id);
        match id {
            Some(id) => state.reclaim_cell(id),
            None => false,
        }
    }

    /// Parks `value` for cell `id` and returns the slot the cell reads from.
    pub(crate) fn hold(&self, id: CellId, key: K, value: Arc<V>) -> SoftSlot<V> {
        let slot = Arc::new(Mutex::new(Some(value)));
        let mut state = self.inner.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, id);
        let previous = state.held.insert(
            id,
            Held {
                seq,
                key,
                slot: Arc::clone(&slot),
            },
        );
        if let Some(previous) = previous {
            state.order.remove(&previous.seq);
        }
        slot
    }

    /// Stops holding cell `id` and hands its value back.
    ///
    /// Returns `None` if the value was reclaimed first; the check and the
    /// take happen under one lock, so a concurrent reclaim cannot slip in.
    pub(crate) fn release(&self, id: CellId) -> Option<Arc<V>> {
        let mut state = self.inner.state.lock();
        let held = state.forget(id)?;
        let value = held.slot.lock().take();
        value
    }

    /// Length of the demotion-order queue.
    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.inner.state.lock().order.len()
    }

    /// Drops everything held and every pending notification.
    pub(crate) fn release_all(&self) {
        let mut state = self.inner.state.lock();
        for (_, held) in state.held.drain() {
            held.slot.lock().take();
        }
        state.order.clear();
        state.notifications.clear();
    }

    /// Takes all queued notifications.
    pub(crate) fn drain(&self) -> Vec<(CellId, K)> {
        let mut state = self.inner.state.lock();
        if state.notifications.is_empty() {
            return Vec::new();
        }
        state.notifications.drain(..).collect()
    }
}

impl<K, V> Reclaimer<K, V>
where
    K: Send + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn downgrade(&self) -> Weak<dyn Reclaim> {
        let weak: Weak<ReclaimerInner<K, V>> = Arc::downgrade(&self.inner);
        weak
    }
}
