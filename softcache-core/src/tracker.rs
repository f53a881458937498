use std::collections::{BTreeMap, HashMap};

use crate::CellId;

/// Recency record of cells for one retention mode.
///
/// Every `touch` stamps the cell with a fresh, monotonically increasing
/// sequence number; the ordered stamp map gives both traversal directions
/// without the O(n) position search of a plain queue.
///
/// # Invariants
///
/// - At most one entry per cell.
/// - `stamps` and `order` always describe the same set of cells.
///
/// # Examples
///
/// ```
/// use softcache_core::{CellId, UsageTracker};
///
/// let mut tracker = UsageTracker::new();
/// let (a, b, c) = (CellId::from_raw(1), CellId::from_raw(2), CellId::from_raw(3));
/// tracker.touch(a);
/// tracker.touch(b);
/// tracker.touch(c);
/// tracker.touch(a); // a is now the most recent
///
/// let mru: Vec<_> = tracker.most_recent_first().collect();
/// assert_eq!(mru, vec![a, c, b]);
///
/// let lru: Vec<_> = tracker.least_recent_first().collect();
/// assert_eq!(lru, vec![b, c, a]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct UsageTracker {
    stamps: HashMap<CellId, u64>,
    order: BTreeMap<u64, CellId>,
    next_stamp: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a use of `cell`, moving it to the most-recent position.
    pub fn touch(&mut self, cell: CellId) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        if let Some(previous) = self.stamps.insert(cell, stamp) {
            self.order.remove(&previous);
        }
        self.order.insert(stamp, cell);
    }

    /// Forgets `cell`. Returns `true` if it was tracked.
    pub fn remove(&mut self, cell: CellId) -> bool {
        match self.stamps.remove(&cell) {
            Some(stamp) => {
                self.order.remove(&stamp);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.stamps.contains_key(&cell)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }

    /// Cells ordered from the most recently used to the least.
    pub fn most_recent_first(&self) -> impl Iterator<Item = CellId> + '_ {
        self.order.values().rev().copied()
    }

    /// Cells ordered from the least recently used to the most.
    pub fn least_recent_first(&self) -> impl Iterator<Item = CellId> + '_ {
        self.order.values().copied()
    }
}
