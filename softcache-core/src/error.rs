//! Error types for the softcache library.
//!
//! Only two families of failure exist here:
//!
//! - **Configuration errors**: invalid policy parameters or an unusable
//!   backing map, reported at construction time.
//! - **Usage errors**: a protocol violation such as removing through a cursor
//!   twice, or asking for the retention of a key that is not cached.
//!
//! Missing keys are not errors (`get`/`remove` return `None`) and external
//! reclamation is a normal state transition, never an error.
//!
//! # Examples
//!
//! ```
//! use softcache_core::{CacheError, DefaultCachingPolicy};
//!
//! let err = DefaultCachingPolicy::new(1.5, 0, 0, 10).unwrap_err();
//! assert!(matches!(err, CacheError::InvalidSoftness(_)));
//! assert!(err.to_string().contains("softness"));
//! ```

use thiserror::Error;

use crate::cursor::CursorState;

/// Errors reported by caches, policies and cursors.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The softness ratio is NaN or outside `[0, 1]`.
    #[error("softness must be within [0, 1], got {0}")]
    InvalidSoftness(f64),

    /// The minimum strong count exceeds the maximum strong count.
    #[error("min_strong ({min_strong}) must not exceed max_strong ({max_strong})")]
    StrongBoundsInverted {
        /// Configured minimum number of strong cells
        min_strong: usize,
        /// Configured maximum number of strong cells
        max_strong: usize,
    },

    /// A caller-supplied backing map already contains entries.
    #[error("backing map must be empty at construction, found {len} entries")]
    BackingMapNotEmpty {
        /// Number of entries found in the supplied map
        len: usize,
    },

    /// A cursor operation was called out of sequence.
    #[error("cursor {operation}() is illegal in state {state:?}; call next() first")]
    IllegalCursorState {
        /// The rejected operation (`remove` or `set_value`)
        operation: &'static str,
        /// The cursor state at the time of the call
        state: CursorState,
    },

    /// The key has no entry in the cache.
    #[error("key is not present in the cache")]
    KeyNotFound,

    /// Internal bookkeeping disagrees with the map contents.
    #[error("cache invariant violated: {0}")]
    InvariantViolation(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
