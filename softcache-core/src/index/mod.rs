//! # Secondary indices
//!
//! An index maps an attribute extracted from cached values back to the keys
//! holding them. Once registered with [`SoftCache::add_index`], it is kept
//! in sync with every insert and removal of the cache, including entries
//! that disappear because their value was reclaimed.
//!
//! Two flavors are provided:
//!
//! - [`OneToOneIndex`]: one key per attribute value (last write wins)
//! - [`OneToManyIndex`]: a group of keys per attribute value, in insertion order
//!
//! Index handles are cheap to clone and share their state. The caller keeps
//! one handle for lookups; the cache keeps another for notifications.
//!
//! Null values are never indexed.
//!
//! # Examples
//!
//! ```
//! use softcache_core::{OneToManyIndex, SoftCache};
//!
//! #[derive(Debug)]
//! struct Book {
//!     author: &'static str,
//! }
//!
//! let mut books: SoftCache<u32, Book> = SoftCache::new();
//! let by_author = OneToManyIndex::new(|b: &Book| b.author);
//! books.add_index(&by_author);
//!
//! books.insert(1, Book { author: "Le Guin" });
//! books.insert(2, Book { author: "Herbert" });
//! books.insert(3, Book { author: "Le Guin" });
//!
//! assert_eq!(by_author.keys(&"Le Guin"), vec![1, 3]);
//! books.remove(&1);
//! assert_eq!(by_author.keys(&"Le Guin"), vec![3]);
//! ```
//!
//! [`SoftCache::add_index`]: crate::SoftCache::add_index

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

mod one_to_many;
mod one_to_one;

pub use one_to_many::OneToManyIndex;
pub use one_to_one::OneToOneIndex;

/// Process-unique identity of an index, shared by all clones of a handle.
///
/// This is how [`SoftCache::remove_index`](crate::SoftCache::remove_index)
/// finds its own copy of the handle it is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexId(u64);

impl IndexId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        IndexId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index#{}", self.0)
    }
}

/// Notification interface between a cache and a secondary index.
///
/// Methods take `&self`: implementations are handles around shared,
/// internally locked state. A cache calls them while it is mutably borrowed,
/// so an implementation must never call back into the cache from here.
pub trait CacheIndex<K, V>: Send {
    /// Identity shared by all clones of this index.
    fn id(&self) -> IndexId;

    /// `value` was stored under `key`.
    fn add_to_index(&self, key: &K, value: &V);

    /// The entry for `key` left the cache. `value` is `None` when the value
    /// had already been reclaimed, in which case the index has to find the
    /// key's records some other way.
    fn remove_from_index(&self, key: &K, value: Option<&V>);

    /// Drops every record.
    fn clear(&self);
}
