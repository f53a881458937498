use std::fmt;
use std::sync::Arc;

use crate::reclaim::{Reclaimer, SoftSlot};
use crate::Retention;

/// Identifier of a retention cell, unique within one cache.
///
/// Policies and usage trackers only ever see cell ids; the cache resolves
/// them to cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Wraps a raw id. Useful for driving a policy in isolation.
    pub const fn from_raw(raw: u64) -> Self {
        CellId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

enum Payload<V> {
    Strong(Arc<V>),
    Reclaimable(SoftSlot<V>),
}

/// Holder for one cached value and its retention mode.
///
/// A strong cell owns its value. A reclaimable cell only shares a slot with
/// the cache's [`Reclaimer`], which owns the value until it is either
/// reclaimed (the slot empties for good) or the cell is promoted back.
///
/// Cells are created for non-null values only; a stored null has no cell.
///
/// # Type Parameters
///
/// * `K` - The key the cell is stored under, kept for reclamation callbacks
/// * `V` - The cached value type
pub struct RetentionCell<K, V> {
    id: CellId,
    key: K,
    payload: Payload<V>,
}

impl<K, V> RetentionCell<K, V> {
    /// Creates a strong cell.
    pub(crate) fn strong(id: CellId, key: K, value: Arc<V>) -> Self {
        Self {
            id,
            key,
            payload: Payload::Strong(value),
        }
    }

    /// Creates a reclaimable cell whose value is parked with `reclaimer`.
    pub(crate) fn reclaimable(
        id: CellId,
        key: K,
        value: Arc<V>,
        reclaimer: &Reclaimer<K, V>,
    ) -> Self
    where
        K: Clone,
    {
        let slot = reclaimer.hold(id, key.clone(), value);
        Self {
            id,
            key,
            payload: Payload::Reclaimable(slot),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn retention(&self) -> Retention {
        match self.payload {
            Payload::Strong(_) => Retention::Strong,
            Payload::Reclaimable(_) => Retention::Reclaimable,
        }
    }

    /// Returns the value, or `None` if it has been reclaimed.
    pub fn value(&self) -> Option<Arc<V>> {
        match &self.payload {
            Payload::Strong(value) => Some(Arc::clone(value)),
            Payload::Reclaimable(slot) => slot.lock().clone(),
        }
    }

    /// Returns `true` once the value has been reclaimed. Permanent.
    pub fn is_reclaimed(&self) -> bool {
        match &self.payload {
            Payload::Strong(_) => false,
            Payload::Reclaimable(slot) => slot.lock().is_none(),
        }
    }

    /// Reclaimable -> strong.
    ///
    /// Returns `true` if a transition happened. No-op when already strong or
    /// when the value was reclaimed.
    pub(crate) fn promote(&mut self, reclaimer: &Reclaimer<K, V>) -> bool {
        if let Payload::Reclaimable(_) = self.payload {
            if let Some(value) = reclaimer.release(self.id) {
                self.payload = Payload::Strong(value);
                return true;
            }
        }
        false
    }

    /// Strong -> reclaimable.
    ///
    /// Returns `true` if a transition happened. No-op when already
    /// reclaimable.
    pub(crate) fn demote(&mut self, reclaimer: &Reclaimer<K, V>) -> bool
    where
        K: Clone,
    {
        let value = match &self.payload {
            Payload::Strong(value) => Arc::clone(value),
            Payload::Reclaimable(_) => return false,
        };
        let slot = reclaimer.hold(self.id, self.key.clone(), value);
        self.payload = Payload::Reclaimable(slot);
        true
    }

    /// Detaches the cell from the reclaimer and hands back the value if it
    /// is still alive. Called when the cell leaves the cache.
    pub(crate) fn dispose(self, reclaimer: &Reclaimer<K, V>) -> Option<Arc<V>> {
        match self.payload {
            Payload::Strong(value) => Some(value),
            Payload::Reclaimable(slot) => {
                let released = reclaimer.release(self.id);
                // Reclaimed concurrently: the slot is already empty
                released.or_else(|| slot.lock().take())
            }
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for RetentionCell<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionCell")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("retention", &self.retention())
            .field("reclaimed", &self.is_reclaimed())
            .finish()
    }
}
