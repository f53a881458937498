use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cursor::{Cursor, Entries, Keys, Values};
use crate::{
    BackingMap, CacheError, CacheIndex, CachingPolicy, CellId, DefaultCachingPolicy, Rebalance,
    Reclaimer, Result, Retention, RetentionCell, RetentionCounts, Slot,
};

#[cfg(feature = "stats")]
use crate::CacheStats;

/// A memory-adaptive associative cache.
///
/// Values are kept either **strong** (never dropped until removed) or
/// **reclaimable** (parked with the cache's [`Reclaimer`] and dropped
/// whenever someone asks it to reclaim). A [`CachingPolicy`] chooses the mode
/// of every new value and keeps rebalancing strong and reclaimable cells as
/// values are read and removed.
///
/// # Type Parameters
///
/// * `K` - Key type
/// * `V` - Value type; values are handed out as `Arc<V>`
/// * `M` - Backing map (defaults to `HashMap<K, Slot>`)
/// * `P` - Caching policy (defaults to [`DefaultCachingPolicy`])
///
/// # Lazy cleanup
///
/// Reclamation happens outside the cache. Every operation first drains the
/// reclaimer's notification queue and removes the entries whose value is
/// gone, so `len`, `is_empty` and `contains_key` are exact as of the call.
///
/// Consecutive calls are still not consistent with each other: a value seen
/// by `contains_key` may be reclaimed before the following `get`. Call `get`
/// first and only consult `contains_key` if it returned `None`.
///
/// # Nulls
///
/// `put(key, None)` stores a null. A null has no cell, so it is never
/// reclaimed: `contains_key` stays `true` while `get` returns `None`.
///
/// # Indices
///
/// Registered [`CacheIndex`]es are told about every insert and removal,
/// including removals caused by reclamation. [`clear`](Self::clear) is the
/// one exception, see its documentation.
///
/// # Thread Safety
///
/// The cache is not internally synchronized; it needs `&mut self` for every
/// operation, reads included. Wrap it in a
/// [`SharedSoftCache`](crate::SharedSoftCache) to share it between threads.
/// The [`Reclaimer`] handle, on the other hand, may be used from anywhere at
/// any time.
///
/// # Examples
///
/// ```
/// use softcache_core::SoftCache;
///
/// let mut cache: SoftCache<&str, i32> = SoftCache::new();
/// assert_eq!(cache.insert("a", 1), None);
/// assert_eq!(cache.get(&"a").as_deref(), Some(&1));
///
/// cache.put("x", None);
/// assert!(cache.contains_key(&"x"));
/// assert_eq!(cache.get(&"x"), None);
///
/// assert_eq!(cache.remove(&"a").as_deref(), Some(&1));
/// assert_eq!(cache.len(), 1);
/// ```
pub struct SoftCache<K, V, M = HashMap<K, Slot>, P = DefaultCachingPolicy> {
    map: M,
    cells: HashMap<CellId, RetentionCell<K, V>>,
    next_id: u64,
    counts: RetentionCounts,
    policy: P,
    reclaimer: Reclaimer<K, V>,
    indices: Vec<Box<dyn CacheIndex<K, V>>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl<K, V> SoftCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty cache with the default policy (softness 0.25, no
    /// bounds) and a `HashMap` backing map.
    pub fn new() -> Self {
        Self::with_policy(DefaultCachingPolicy::default())
    }
}

impl<K, V, M, P> Default for SoftCache<K, V, M, P>
where
    K: Clone,
    M: BackingMap<K, Slot>,
    P: CachingPolicy + Default,
{
    fn default() -> Self {
        Self::with_policy(P::default())
    }
}

impl<K, V, M, P> SoftCache<K, V, M, P>
where
    K: Clone,
    M: BackingMap<K, Slot>,
    P: CachingPolicy,
{
    /// Creates an empty cache driven by `policy`.
    pub fn with_policy(policy: P) -> Self {
        Self {
            map: M::default(),
            cells: HashMap::new(),
            next_id: 0,
            counts: RetentionCounts::default(),
            policy,
            reclaimer: Reclaimer::new(),
            indices: Vec::new(),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        }
    }

    /// Creates a cache on top of a caller-supplied backing map.
    ///
    /// # Errors
    ///
    /// [`CacheError::BackingMapNotEmpty`] if `map` already has entries: they
    /// would reference cells this cache does not own. Use
    /// [`from_entries`](Self::from_entries) to pre-seed a cache.
    pub fn with_backing(policy: P, map: M) -> Result<Self> {
        if !map.is_empty() {
            return Err(CacheError::BackingMapNotEmpty { len: map.len() });
        }
        let mut cache = Self::with_policy(policy);
        cache.map = map;
        Ok(cache)
    }

    /// Creates a cache pre-seeded with `entries`, as if each one was `put`.
    pub fn from_entries<I>(policy: P, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        let mut cache = Self::with_policy(policy);
        cache.put_all(entries);
        cache
    }

    /// Returns the value stored under `key`.
    ///
    /// Counts as a use for the policy, which may promote the cell (and demote
    /// a counterbalance). Returns `None` when the key is absent, holds a
    /// null, or its value has been reclaimed.
    pub fn get(&mut self, key: &K) -> Option<Arc<V>> {
        self.cleanup();
        let id = match self.map.get(key) {
            None => {
                self.record_miss();
                return None;
            }
            Some(None) => {
                self.record_hit();
                return None;
            }
            Some(Some(id)) => *id,
        };

        let found = self
            .cells
            .get(&id)
            .and_then(|cell| cell.value().map(|value| (value, cell.retention())));
        match found {
            Some((value, retention)) => {
                self.record_hit();
                if let Some(rebalance) = self.policy.used(self.counts, id, retention) {
                    self.apply(rebalance);
                }
                Some(value)
            }
            None => {
                // Reclaimed after the cleanup pass
                self.expunge(key, id);
                self.record_miss();
                None
            }
        }
    }

    /// Stores `value` (or a null) under `key`.
    ///
    /// A new cell is created first, with the retention the policy picks;
    /// then the previous cell, if any, is disposed and removed from every
    /// index before the new entry is indexed.
    ///
    /// Returns the previous value if it was non-null and still alive.
    pub fn put(&mut self, key: K, value: Option<V>) -> Option<Arc<V>> {
        self.store(key, value.map(Arc::new))
    }

    /// Stores a value the caller already shares, without copying it.
    pub fn put_shared(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.store(key, Some(value))
    }

    /// Stores a non-null value. Shorthand for `put(key, Some(value))`.
    pub fn insert(&mut self, key: K, value: V) -> Option<Arc<V>> {
        self.put(key, Some(value))
    }

    fn store(&mut self, key: K, value: Option<Arc<V>>) -> Option<Arc<V>> {
        self.cleanup();
        let (slot, fresh) = match value {
            Some(value) => {
                let id = self.create_cell(key.clone(), Arc::clone(&value));
                (Some(id), Some(value))
            }
            None => (None, None),
        };

        let previous = match self.map.insert(key.clone(), slot) {
            Some(Some(old)) => {
                let value = self.release_cell(old);
                self.index_removed(&key, value.as_deref());
                value
            }
            Some(None) | None => None,
        };

        if let Some(value) = &fresh {
            self.index_added(&key, value);
        }
        previous
    }

    /// Stores every entry, in iteration order.
    pub fn put_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    /// Removes `key`, returning its value if it was non-null and alive.
    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.cleanup();
        match self.map.remove(key)? {
            Some(id) => {
                let value = self.release_cell(id);
                self.index_removed(key, value.as_deref());
                value
            }
            None => None,
        }
    }

    /// Disposes every cell through the policy and empties the map.
    ///
    /// Registered indices are neither cleared nor notified: they keep their
    /// records until cleared by the caller (their lookups still come back
    /// empty, since every key is gone). Index registrations are kept.
    pub fn clear(&mut self) {
        self.cleanup();
        let ids: Vec<CellId> = self.cells.keys().copied().collect();
        for id in ids {
            self.release_cell(id);
        }
        self.map.clear();
        debug!("cache cleared");
    }

    /// Number of entries, stored nulls included.
    pub fn len(&mut self) -> usize {
        self.cleanup();
        self.map.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.cleanup();
        self.map.is_empty()
    }

    /// Whether `key` has an entry, null or alive.
    pub fn contains_key(&mut self, key: &K) -> bool {
        self.cleanup();
        self.live_entry(key).is_some()
    }

    /// Whether any live entry holds `value` (`None` looks for stored nulls).
    ///
    /// Scans every entry.
    pub fn contains_value(&mut self, value: Option<&V>) -> bool
    where
        V: PartialEq,
    {
        self.cleanup();
        self.map.iter().any(|(_, slot)| match (slot, value) {
            (None, None) => true,
            (Some(id), Some(wanted)) => self
                .cells
                .get(id)
                .and_then(|cell| cell.value())
                .map_or(false, |stored| *stored == *wanted),
            _ => false,
        })
    }

    /// Retention of the value stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(retention))` - For a live value
    /// * `Ok(None)` - For a stored null
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyNotFound`] if the key is absent or was just reclaimed.
    pub fn retention(&mut self, key: &K) -> Result<Option<Retention>> {
        self.cleanup();
        let id = match self.map.get(key) {
            None => return Err(CacheError::KeyNotFound),
            Some(None) => return Ok(None),
            Some(Some(id)) => *id,
        };
        match self.cells.get(&id) {
            Some(cell) if !cell.is_reclaimed() => Ok(Some(cell.retention())),
            _ => {
                self.expunge(key, id);
                Err(CacheError::KeyNotFound)
            }
        }
    }

    /// Cursor over keys. See [`Cursor`] for the removal protocol.
    pub fn keys(&mut self) -> Keys<'_, K, V, M, P> {
        self.cleanup();
        Cursor::new(self, |key, _| key)
    }

    /// Cursor over values; stored nulls come out as `None`.
    pub fn values(&mut self) -> Values<'_, K, V, M, P> {
        self.cleanup();
        Cursor::new(self, |_, value| value)
    }

    /// Cursor over `(key, value)` entries. Supports `set_value`.
    pub fn entries(&mut self) -> Entries<'_, K, V, M, P> {
        self.cleanup();
        Cursor::new(self, |key, value| (key, value))
    }

    /// Registers `index`, back-filling it from every live entry first.
    ///
    /// The cache keeps its own clone of the handle. Returns `false` (and does
    /// nothing) if the index is already registered.
    pub fn add_index<I>(&mut self, index: &I) -> bool
    where
        I: CacheIndex<K, V> + Clone + 'static,
    {
        if self.indices.iter().any(|known| known.id() == index.id()) {
            return false;
        }
        self.cleanup();
        let mut live = Vec::new();
        for (key, slot) in self.map.iter() {
            if let Some(value) = slot
                .and_then(|id| self.cells.get(&id))
                .and_then(|cell| cell.value())
            {
                live.push((key.clone(), value));
            }
        }
        for (key, value) in &live {
            index.add_to_index(key, value);
        }
        self.indices.push(Box::new(index.clone()));
        debug!(index = %index.id(), backfilled = live.len(), "index registered");
        true
    }

    /// Unregisters `index`. Its contents are left as they are.
    pub fn remove_index(&mut self, index: &dyn CacheIndex<K, V>) -> bool {
        let id = index.id();
        let before = self.indices.len();
        self.indices.retain(|known| known.id() != id);
        let removed = self.indices.len() != before;
        if removed {
            debug!(index = %id, "index unregistered");
        }
        removed
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of strong cells.
    pub fn strong_count(&mut self) -> usize {
        self.counts().strong
    }

    /// Number of reclaimable cells whose value is still held.
    pub fn reclaimable_count(&mut self) -> usize {
        self.counts().reclaimable
    }

    /// Both retention counters, after removing reclaimed entries.
    pub fn counts(&mut self) -> RetentionCounts {
        self.cleanup();
        self.counts
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// A handle on this cache's reclaimer.
    pub fn reclaimer(&self) -> Reclaimer<K, V> {
        self.reclaimer.clone()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drains reclamation notifications and removes the dead entries.
    ///
    /// Every public operation does this first; calling it directly is only
    /// useful to force the bookkeeping to catch up. Returns the number of
    /// entries removed.
    pub fn purge_reclaimed(&mut self) -> usize {
        self.cleanup()
    }

    /// Verifies that counters, cells, map slots, policy trackers and the
    /// reclaimer agree with each other.
    pub fn check_invariants(&self) -> Result<()>
    where
        K: PartialEq,
    {
        let mut strong = 0;
        let mut reclaimable = 0;
        let mut alive_reclaimable = 0;
        for cell in self.cells.values() {
            match cell.retention() {
                Retention::Strong => strong += 1,
                Retention::Reclaimable => {
                    reclaimable += 1;
                    if !cell.is_reclaimed() {
                        alive_reclaimable += 1;
                    }
                }
            }
        }
        if strong != self.counts.strong || reclaimable != self.counts.reclaimable {
            return Err(CacheError::InvariantViolation(format!(
                "counters {:?} disagree with cells (strong {}, reclaimable {})",
                self.counts, strong, reclaimable
            )));
        }

        let mut referenced = 0;
        for (key, slot) in self.map.iter() {
            let Some(id) = slot else { continue };
            referenced += 1;
            match self.cells.get(id) {
                Some(cell) if cell.key() == key => {}
                Some(_) => {
                    return Err(CacheError::InvariantViolation(format!(
                        "cell {id} is stored under a different key"
                    )))
                }
                None => {
                    return Err(CacheError::InvariantViolation(format!(
                        "map references missing cell {id}"
                    )))
                }
            }
        }
        if referenced != self.cells.len() {
            return Err(CacheError::InvariantViolation(format!(
                "{} cells but {} map slots reference cells",
                self.cells.len(),
                referenced
            )));
        }

        for retention in [Retention::Strong, Retention::Reclaimable] {
            if let Some(tracked) = self.policy.tracked(retention) {
                if tracked != self.counts.get(retention) {
                    return Err(CacheError::InvariantViolation(format!(
                        "policy tracks {tracked} {retention} cells, counters say {}",
                        self.counts.get(retention)
                    )));
                }
            }
        }

        let held = self.reclaimer.held();
        if held != alive_reclaimable {
            return Err(CacheError::InvariantViolation(format!(
                "reclaimer holds {held} values, {alive_reclaimable} reclaimable cells are alive"
            )));
        }
        Ok(())
    }

    /// Snapshot of every key, used by cursors.
    pub(crate) fn snapshot_keys(&self) -> Vec<K> {
        self.map.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Current entry for `key`, expunging it on the spot if its value was
    /// reclaimed.
    ///
    /// * `None` - No entry (or it was just expunged)
    /// * `Some(None)` - Stored null
    /// * `Some(Some(value))` - Live value
    pub(crate) fn live_entry(&mut self, key: &K) -> Option<Option<Arc<V>>> {
        let id = match self.map.get(key)? {
            None => return Some(None),
            Some(id) => *id,
        };
        match self.cells.get(&id).and_then(|cell| cell.value()) {
            Some(value) => Some(Some(value)),
            None => {
                self.expunge(key, id);
                None
            }
        }
    }

    fn cleanup(&mut self) -> usize {
        let notifications = self.reclaimer.drain();
        if notifications.is_empty() {
            return 0;
        }
        let mut expunged = 0;
        for (id, key) in notifications {
            if self.expunge(&key, id) {
                expunged += 1;
            }
        }
        debug!(expunged, "lazy cleanup removed reclaimed entries");
        expunged
    }

    /// Removes the entry for `key` if it still refers to cell `id`, which
    /// lost its value. Stale notifications (entry replaced or removed since)
    /// are ignored.
    fn expunge(&mut self, key: &K, id: CellId) -> bool {
        let current = matches!(self.map.get(key), Some(Some(stored)) if *stored == id);
        if !current {
            return false;
        }
        self.map.remove(key);
        self.release_cell(id);
        self.index_removed(key, None);
        self.record_reclaimed();
        trace!(cell = %id, "expunged reclaimed entry");
        true
    }

    fn create_cell(&mut self, key: K, value: Arc<V>) -> CellId {
        let id = CellId::from_raw(self.next_id);
        self.next_id += 1;
        let cell = if self.policy.create_reclaimable(self.counts) {
            RetentionCell::reclaimable(id, key, value, &self.reclaimer)
        } else {
            RetentionCell::strong(id, key, value)
        };
        let retention = cell.retention();
        self.counts.increment(retention);
        self.policy.created(id, retention);
        self.cells.insert(id, cell);
        id
    }

    /// Takes cell `id` out of the arena, the counters, the reclaimer and the
    /// policy, then applies whatever rebalance the policy asks for. Index
    /// records are left to the caller.
    fn release_cell(&mut self, id: CellId) -> Option<Arc<V>> {
        let cell = self.cells.remove(&id)?;
        let retention = cell.retention();
        let value = cell.dispose(&self.reclaimer);
        self.counts.decrement(retention);
        if let Some(rebalance) = self.policy.disposed(self.counts, id, retention) {
            self.apply(rebalance);
        }
        value
    }

    fn apply(&mut self, rebalance: Rebalance) {
        match rebalance {
            Rebalance::Promote { cell, demote } => {
                if self.flip(cell, Retention::Strong) {
                    if let Some(counter) = demote {
                        self.flip(counter, Retention::Reclaimable);
                    }
                }
            }
            Rebalance::Demote(cell) => {
                self.flip(cell, Retention::Reclaimable);
            }
        }
    }

    /// Moves cell `id` to `target`. Missing cells, cells already in `target`
    /// and reclaimed cells are left alone.
    fn flip(&mut self, id: CellId, target: Retention) -> bool {
        let Some(cell) = self.cells.get_mut(&id) else {
            return false;
        };
        let from = cell.retention();
        let changed = match target {
            Retention::Strong => cell.promote(&self.reclaimer),
            Retention::Reclaimable => cell.demote(&self.reclaimer),
        };
        if !changed {
            return false;
        }
        self.counts.transfer(from);
        self.policy.retention_changed(id, from);
        match target {
            Retention::Strong => self.record_promotion(),
            Retention::Reclaimable => self.record_demotion(),
        }
        trace!(cell = %id, %from, to = %target, "retention changed");
        true
    }

    fn index_added(&self, key: &K, value: &V) {
        for index in &self.indices {
            index.add_to_index(key, value);
        }
    }

    fn index_removed(&self, key: &K, value: Option<&V>) {
        for index in &self.indices {
            index.remove_from_index(key, value);
        }
    }

    #[inline]
    fn record_hit(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_hit();
    }

    #[inline]
    fn record_miss(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_miss();
    }

    #[inline]
    fn record_reclaimed(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_reclaimed();
    }

    #[inline]
    fn record_promotion(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_promotion();
    }

    #[inline]
    fn record_demotion(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_demotion();
    }
}

/// Formats as `{key=value, key2*=value2}`, where `*` marks a reclaimable
/// entry and a stored null prints as `null`. Reclaimed values awaiting
/// cleanup are skipped. Entry order is the backing map's order.
impl<K, V, M, P> fmt::Display for SoftCache<K, V, M, P>
where
    K: fmt::Display,
    V: fmt::Display,
    M: BackingMap<K, Slot>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        for (key, slot) in self.map.iter() {
            let (value, marker) = match slot {
                None => (None, ""),
                Some(id) => {
                    let Some(cell) = self.cells.get(id) else {
                        continue;
                    };
                    let Some(value) = cell.value() else {
                        continue;
                    };
                    let marker = if cell.retention().is_reclaimable() {
                        "*"
                    } else {
                        ""
                    };
                    (Some(value), marker)
                }
            };
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                Some(value) => write!(f, "{key}{marker}={value}")?,
                None => write!(f, "{key}=null")?,
            }
        }
        f.write_str("}")
    }
}

impl<K, V, M, P> fmt::Debug for SoftCache<K, V, M, P>
where
    M: BackingMap<K, Slot>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftCache")
            .field("entries", &self.map.len())
            .field("counts", &self.counts)
            .field("indices", &self.indices.len())
            .finish()
    }
}

impl<K, V, M, P> Drop for SoftCache<K, V, M, P> {
    fn drop(&mut self) {
        self.reclaimer.release_all();
    }
}
