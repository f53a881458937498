use std::fmt;

/// How a cached value is held by its cell.
///
/// # Variants
///
/// * `Strong` - The value is owned by the cell and survives until it is
///   explicitly removed or overwritten.
/// * `Reclaimable` - The value is parked with the cache's [`Reclaimer`]
///   and may be dropped at any time by an external reclaim pass. Once
///   reclaimed, the entry disappears on the next cache operation.
///
/// # Examples
///
/// ```
/// use softcache_core::Retention;
///
/// assert_eq!(Retention::default(), Retention::Strong);
/// assert!(Retention::Reclaimable.is_reclaimable());
/// assert_eq!(Retention::Strong.opposite(), Retention::Reclaimable);
/// assert_eq!(Retention::Reclaimable.to_string(), "reclaimable");
/// ```
///
/// [`Reclaimer`]: crate::Reclaimer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Retention {
    #[default]
    Strong,
    Reclaimable,
}

impl Retention {
    /// Returns `true` for [`Retention::Reclaimable`].
    #[inline]
    pub const fn is_reclaimable(self) -> bool {
        matches!(self, Retention::Reclaimable)
    }

    /// Returns the other retention mode.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Retention::Strong => Retention::Reclaimable,
            Retention::Reclaimable => Retention::Strong,
        }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retention::Strong => f.write_str("strong"),
            Retention::Reclaimable => f.write_str("reclaimable"),
        }
    }
}

/// Running counts of live cells per retention mode.
///
/// The store keeps one of these and hands a copy to the caching policy on
/// every decision, so the policy never reaches back into the store.
///
/// # Examples
///
/// ```
/// use softcache_core::{Retention, RetentionCounts};
///
/// let mut counts = RetentionCounts::default();
/// counts.increment(Retention::Strong);
/// counts.increment(Retention::Reclaimable);
/// counts.increment(Retention::Reclaimable);
/// assert_eq!(counts.total(), 3);
/// assert_eq!(counts.get(Retention::Reclaimable), 2);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetentionCounts {
    pub strong: usize,
    pub reclaimable: usize,
}

impl RetentionCounts {
    /// Number of live cells in both modes.
    #[inline]
    pub fn total(&self) -> usize {
        self.strong + self.reclaimable
    }

    /// Count for a single mode.
    #[inline]
    pub fn get(&self, retention: Retention) -> usize {
        match retention {
            Retention::Strong => self.strong,
            Retention::Reclaimable => self.reclaimable,
        }
    }

    pub fn increment(&mut self, retention: Retention) {
        match retention {
            Retention::Strong => self.strong += 1,
            Retention::Reclaimable => self.reclaimable += 1,
        }
    }

    pub fn decrement(&mut self, retention: Retention) {
        match retention {
            Retention::Strong => self.strong = self.strong.saturating_sub(1),
            Retention::Reclaimable => self.reclaimable = self.reclaimable.saturating_sub(1),
        }
    }

    /// Moves one cell from `from` to its opposite mode.
    pub fn transfer(&mut self, from: Retention) {
        self.decrement(from);
        self.increment(from.opposite());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_one_cell() {
        let mut counts = RetentionCounts {
            strong: 2,
            reclaimable: 1,
        };
        counts.transfer(Retention::Strong);
        assert_eq!(counts.strong, 1);
        assert_eq!(counts.reclaimable, 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_decrement_saturates() {
        let mut counts = RetentionCounts::default();
        counts.decrement(Retention::Reclaimable);
        assert_eq!(counts.reclaimable, 0);
    }
}
