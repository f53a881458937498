//! # Cursors
//!
//! Iteration over a [`SoftCache`] with in-place removal.
//!
//! A cursor walks a snapshot of the keys taken when it was created and
//! re-checks every key against the cache before yielding it. Entries whose
//! value was reclaimed in the meantime are skipped (and expunged), so a
//! cursor never yields a dead entry and never fails because the cache
//! changed underneath it.
//!
//! # Removal protocol
//!
//! [`Cursor::remove`] and [`Cursor::set_value`] act on the element returned
//! by the last [`next`](Iterator::next). They are only legal right after a
//! successful `next`:
//!
//! | state      | entered by                     | `remove` / `set_value` |
//! |------------|--------------------------------|------------------------|
//! | `Ready`    | creation, `has_next`, `None`   | error                  |
//! | `Consumed` | `next` returning an element    | allowed                |
//! | `Removed`  | `remove`                       | error                  |
//!
//! # Examples
//!
//! ```
//! use softcache_core::SoftCache;
//!
//! let mut cache: SoftCache<u32, u32> = SoftCache::new();
//! for i in 0..6 {
//!     cache.insert(i, i * 10);
//! }
//!
//! let mut keys = cache.keys();
//! while let Some(key) = keys.next() {
//!     if key % 2 == 1 {
//!         keys.remove().unwrap();
//!     }
//! }
//! drop(keys);
//!
//! assert_eq!(cache.len(), 3);
//! assert!(!cache.contains_key(&1));
//! ```

use std::sync::Arc;

use crate::{BackingMap, CacheError, CachingPolicy, Result, Slot, SoftCache};

/// Where a cursor stands with respect to its last element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// No current element; `remove` is illegal.
    Ready,
    /// `next` just returned an element; `remove` is legal.
    Consumed,
    /// The current element was removed; `remove` is illegal until `next`.
    Removed,
}

/// Removal-capable iterator over a [`SoftCache`].
///
/// Created by [`SoftCache::keys`], [`SoftCache::values`] and
/// [`SoftCache::entries`]. Holds the cache mutably for its whole lifetime;
/// the cache's [`Reclaimer`](crate::Reclaimer) remains usable meanwhile.
pub struct Cursor<'a, K, V, M, P, T> {
    cache: &'a mut SoftCache<K, V, M, P>,
    keys: std::vec::IntoIter<K>,
    lookahead: Option<(K, Option<Arc<V>>)>,
    current: Option<K>,
    state: CursorState,
    project: fn(K, Option<Arc<V>>) -> T,
}

/// Cursor over keys.
pub type Keys<'a, K, V, M, P> = Cursor<'a, K, V, M, P, K>;

/// Cursor over values; a stored null is `None`.
pub type Values<'a, K, V, M, P> = Cursor<'a, K, V, M, P, Option<Arc<V>>>;

/// Cursor over `(key, value)` pairs.
pub type Entries<'a, K, V, M, P> = Cursor<'a, K, V, M, P, (K, Option<Arc<V>>)>;

impl<'a, K, V, M, P, T> Cursor<'a, K, V, M, P, T>
where
    K: Clone,
    M: BackingMap<K, Slot>,
    P: CachingPolicy,
{
    pub(crate) fn new(
        cache: &'a mut SoftCache<K, V, M, P>,
        project: fn(K, Option<Arc<V>>) -> T,
    ) -> Self {
        let keys = cache.snapshot_keys().into_iter();
        Self {
            cache,
            keys,
            lookahead: None,
            current: None,
            state: CursorState::Ready,
            project,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Whether another live element exists.
    ///
    /// Looks ahead by one element, and resets the state to `Ready`: calling
    /// `remove` after `has_next` is an error.
    pub fn has_next(&mut self) -> bool {
        if self.lookahead.is_none() {
            self.lookahead = self.advance();
        }
        self.current = None;
        self.state = CursorState::Ready;
        self.lookahead.is_some()
    }

    /// Removes the element returned by the last `next` from the cache.
    ///
    /// # Errors
    ///
    /// [`CacheError::IllegalCursorState`] unless the cursor is `Consumed`.
    pub fn remove(&mut self) -> Result<Option<Arc<V>>> {
        let key = self.take_current("remove")?;
        self.state = CursorState::Removed;
        Ok(self.cache.remove(&key))
    }

    /// Replaces the value of the element returned by the last `next`.
    ///
    /// Goes through [`SoftCache::put`], so the policy picks a fresh
    /// retention and indices are updated. The cursor stays `Consumed`.
    ///
    /// # Errors
    ///
    /// [`CacheError::IllegalCursorState`] unless the cursor is `Consumed`.
    pub fn set_value(&mut self, value: Option<V>) -> Result<Option<Arc<V>>> {
        let key = self.take_current("set_value")?;
        self.current = Some(key.clone());
        Ok(self.cache.put(key, value))
    }

    fn take_current(&mut self, operation: &'static str) -> Result<K> {
        let illegal = CacheError::IllegalCursorState {
            operation,
            state: self.state,
        };
        if self.state != CursorState::Consumed {
            return Err(illegal);
        }
        self.current.take().ok_or(illegal)
    }

    fn advance(&mut self) -> Option<(K, Option<Arc<V>>)> {
        for key in self.keys.by_ref() {
            if let Some(value) = self.cache.live_entry(&key) {
                return Some((key, value));
            }
        }
        None
    }
}

impl<'a, K, V, M, P, T> Iterator for Cursor<'a, K, V, M, P, T>
where
    K: Clone,
    M: BackingMap<K, Slot>,
    P: CachingPolicy,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let next = match self.lookahead.take() {
            Some(entry) => Some(entry),
            None => self.advance(),
        };
        match next {
            Some((key, value)) => {
                self.current = Some(key.clone());
                self.state = CursorState::Consumed;
                Some((self.project)(key, value))
            }
            None => {
                self.current = None;
                self.state = CursorState::Ready;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let buffered = usize::from(self.lookahead.is_some());
        (0, Some(self.keys.len() + buffered))
    }
}
