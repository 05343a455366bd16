//! Error types for the shardmap library.
//!
//! Normal operation never produces an error: lookups miss via `Option`,
//! removals report `bool`, and out-of-range construction parameters are
//! normalized to documented defaults instead of being rejected. The only
//! error type here is [`InvariantError`], produced by debug-only
//! `check_invariants` methods when an internal data-structure invariant has
//! been violated (which always indicates a bug in this crate, not in the
//! caller).

use std::fmt;

/// Error returned when an internal data-structure invariant is violated.
///
/// Produced by debug-only `check_invariants` methods on the LRU core.
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}
