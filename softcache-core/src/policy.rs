//! # Caching policies
//!
//! A caching policy decides whether a new cell starts strong or reclaimable
//! and how retention modes are rebalanced when cells are used or disposed.
//!
//! Policies work on [`CellId`]s and [`RetentionCounts`] only. They never
//! touch cells; instead they return a [`Rebalance`] that the cache applies,
//! reporting every successful flip back through
//! [`CachingPolicy::retention_changed`].

use tracing::trace;

use crate::{CacheError, CellId, Result, Retention, RetentionCounts, UsageTracker};

/// A retention flip requested by a policy.
///
/// The cache applies it and silently skips candidates that are gone or
/// already reclaimed: disposal order races against external reclamation, so
/// a stale candidate is expected, not a bug.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rebalance {
    /// Promote `cell`; if that succeeds, demote the counterbalance `demote`.
    Promote {
        cell: CellId,
        demote: Option<CellId>,
    },
    /// Demote `cell`.
    Demote(CellId),
}

/// Decides retention modes for a [`SoftCache`](crate::SoftCache).
///
/// The cache calls these hooks in the following order:
///
/// 1. `create_reclaimable` when a non-null value is stored, then `created`
///    with the chosen mode.
/// 2. `used` on every successful `get`.
/// 3. `disposed` after a cell left the cache (counts already updated).
/// 4. `retention_changed` after every flip the cache performed.
pub trait CachingPolicy {
    /// Whether a cell created now should be reclaimable.
    fn create_reclaimable(&self, counts: RetentionCounts) -> bool;

    /// A cell was created with the given retention.
    fn created(&mut self, cell: CellId, retention: Retention);

    /// A cell was read.
    fn used(&mut self, counts: RetentionCounts, cell: CellId, retention: Retention)
        -> Option<Rebalance>;

    /// A cell left the cache. `counts` no longer include it.
    fn disposed(
        &mut self,
        counts: RetentionCounts,
        cell: CellId,
        retention: Retention,
    ) -> Option<Rebalance>;

    /// A cell flipped from `from` to the opposite mode.
    fn retention_changed(&mut self, cell: CellId, from: Retention);

    /// Number of cells the policy tracks for `retention`, if it tracks any.
    /// Only used by invariant checks.
    fn tracked(&self, _retention: Retention) -> Option<usize> {
        None
    }
}

impl<P: CachingPolicy + ?Sized> CachingPolicy for Box<P> {
    fn create_reclaimable(&self, counts: RetentionCounts) -> bool {
        (**self).create_reclaimable(counts)
    }

    fn created(&mut self, cell: CellId, retention: Retention) {
        (**self).created(cell, retention)
    }

    fn used(
        &mut self,
        counts: RetentionCounts,
        cell: CellId,
        retention: Retention,
    ) -> Option<Rebalance> {
        (**self).used(counts, cell, retention)
    }

    fn disposed(
        &mut self,
        counts: RetentionCounts,
        cell: CellId,
        retention: Retention,
    ) -> Option<Rebalance> {
        (**self).disposed(counts, cell, retention)
    }

    fn retention_changed(&mut self, cell: CellId, from: Retention) {
        (**self).retention_changed(cell, from)
    }

    fn tracked(&self, retention: Retention) -> Option<usize> {
        (**self).tracked(retention)
    }
}

/// Parameters of the [`DefaultCachingPolicy`].
///
/// # Fields
///
/// * `softness` - Target fraction of reclaimable cells among all live cells
/// * `min_reclaimable` - Keep creating reclaimable cells until this many exist
/// * `min_strong` - Create strong cells until this many exist
/// * `max_strong` - Never create a strong cell once this many exist
///
/// # Examples
///
/// ```
/// use softcache_core::{DefaultCachingPolicy, PolicyConfig};
///
/// let config = PolicyConfig {
///     softness: 0.5,
///     max_strong: 1_000,
///     ..PolicyConfig::default()
/// };
/// let policy = DefaultCachingPolicy::from_config(config).unwrap();
/// assert_eq!(policy.softness(), 0.5);
/// assert_eq!(policy.min_strong(), 0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolicyConfig {
    pub softness: f64,
    pub min_reclaimable: usize,
    pub min_strong: usize,
    pub max_strong: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            softness: 0.25,
            min_reclaimable: 0,
            min_strong: 0,
            max_strong: usize::MAX,
        }
    }
}

impl PolicyConfig {
    /// Checks `0 <= softness <= 1` and `min_strong <= max_strong`.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.softness) {
            return Err(CacheError::InvalidSoftness(self.softness));
        }
        if self.min_strong > self.max_strong {
            return Err(CacheError::StrongBoundsInverted {
                min_strong: self.min_strong,
                max_strong: self.max_strong,
            });
        }
        Ok(())
    }
}

/// Greedy softness-steering policy.
///
/// # Creation
///
/// A new cell is reclaimable iff `strong >= min_strong` and at least one of:
/// `reclaimable < min_reclaimable`, `strong >= max_strong`, or
/// `reclaimable / (reclaimable + strong + 1) < softness`. That fills the
/// strong minimum first, then the reclaimable minimum, then caps the strong
/// count, then steers towards the target softness.
///
/// # Use
///
/// The cell moves to the front of its tracker. A reclaimable cell is
/// promoted, and if that succeeds the most recently used other strong cell
/// is demoted as its counterbalance.
///
/// # Disposal
///
/// The cell leaves its tracker. If it was reclaimable, strong cells remain
/// and the store would now create a reclaimable cell, the most recently used
/// strong cell is demoted. If it was strong, reclaimable cells remain and the
/// store would now create a strong cell, the *least* recently used
/// reclaimable cell is promoted: the one that survived longest as
/// reclaimable.
///
/// This only approximately tracks the target ratio; it is an O(log n) per
/// call heuristic, not an optimal cache policy.
///
/// # Examples
///
/// ```
/// use softcache_core::{CachingPolicy, DefaultCachingPolicy, RetentionCounts};
///
/// let policy = DefaultCachingPolicy::default();
/// assert_eq!(policy.softness(), 0.25);
///
/// // An empty store: 0 / (0 + 0 + 1) < 0.25
/// assert!(policy.create_reclaimable(RetentionCounts::default()));
///
/// // One reclaimable cell already: 1 / 2 >= 0.25
/// let counts = RetentionCounts { strong: 0, reclaimable: 1 };
/// assert!(!policy.create_reclaimable(counts));
/// ```
#[derive(Clone, Debug)]
pub struct DefaultCachingPolicy {
    config: PolicyConfig,
    strong: UsageTracker,
    reclaimable: UsageTracker,
}

impl DefaultCachingPolicy {
    /// Creates a policy, validating its parameters.
    ///
    /// # Errors
    ///
    /// * [`CacheError::InvalidSoftness`] if `softness` is NaN or outside `[0, 1]`
    /// * [`CacheError::StrongBoundsInverted`] if `min_strong > max_strong`
    pub fn new(
        softness: f64,
        min_reclaimable: usize,
        min_strong: usize,
        max_strong: usize,
    ) -> Result<Self> {
        Self::from_config(PolicyConfig {
            softness,
            min_reclaimable,
            min_strong,
            max_strong,
        })
    }

    pub fn from_config(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            strong: UsageTracker::new(),
            reclaimable: UsageTracker::new(),
        })
    }

    pub fn config(&self) -> PolicyConfig {
        self.config
    }

    pub fn softness(&self) -> f64 {
        self.config.softness
    }

    pub fn min_reclaimable(&self) -> usize {
        self.config.min_reclaimable
    }

    pub fn min_strong(&self) -> usize {
        self.config.min_strong
    }

    pub fn max_strong(&self) -> usize {
        self.config.max_strong
    }

    /// The usage tracker for one retention mode.
    pub fn tracker(&self, retention: Retention) -> &UsageTracker {
        match retention {
            Retention::Strong => &self.strong,
            Retention::Reclaimable => &self.reclaimable,
        }
    }

    fn tracker_mut(&mut self, retention: Retention) -> &mut UsageTracker {
        match retention {
            Retention::Strong => &mut self.strong,
            Retention::Reclaimable => &mut self.reclaimable,
        }
    }
}

impl Default for DefaultCachingPolicy {
    fn default() -> Self {
        Self {
            config: PolicyConfig::default(),
            strong: UsageTracker::new(),
            reclaimable: UsageTracker::new(),
        }
    }
}

impl CachingPolicy for DefaultCachingPolicy {
    fn create_reclaimable(&self, counts: RetentionCounts) -> bool {
        let RetentionCounts {
            strong,
            reclaimable,
        } = counts;
        let ratio = reclaimable as f64 / (reclaimable + strong + 1) as f64;
        strong >= self.config.min_strong
            && (reclaimable < self.config.min_reclaimable
                || strong >= self.config.max_strong
                || ratio < self.config.softness)
    }

    fn created(&mut self, cell: CellId, retention: Retention) {
        self.tracker_mut(retention).touch(cell);
    }

    fn used(
        &mut self,
        _counts: RetentionCounts,
        cell: CellId,
        retention: Retention,
    ) -> Option<Rebalance> {
        self.tracker_mut(retention).touch(cell);
        if !retention.is_reclaimable() {
            return None;
        }
        let demote = self.strong.most_recent_first().find(|&other| other != cell);
        trace!(%cell, ?demote, "promoting used reclaimable cell");
        Some(Rebalance::Promote { cell, demote })
    }

    fn disposed(
        &mut self,
        counts: RetentionCounts,
        cell: CellId,
        retention: Retention,
    ) -> Option<Rebalance> {
        self.tracker_mut(retention).remove(cell);
        match retention {
            Retention::Reclaimable if counts.strong > 0 && self.create_reclaimable(counts) => {
                let counter = self.strong.most_recent_first().next()?;
                trace!(%cell, %counter, "demoting counterbalance after disposal");
                Some(Rebalance::Demote(counter))
            }
            Retention::Strong if counts.reclaimable > 0 && !self.create_reclaimable(counts) => {
                let counter = self.reclaimable.least_recent_first().next()?;
                trace!(%cell, %counter, "promoting counterbalance after disposal");
                Some(Rebalance::Promote {
                    cell: counter,
                    demote: None,
                })
            }
            _ => None,
        }
    }

    fn retention_changed(&mut self, cell: CellId, from: Retention) {
        self.tracker_mut(from).remove(cell);
        self.tracker_mut(from.opposite()).touch(cell);
    }

    fn tracked(&self, retention: Retention) -> Option<usize> {
        Some(self.tracker(retention).len())
    }
}
