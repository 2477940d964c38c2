//! Core type definitions for orma.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a unit-of-work scope.
///
/// Scope IDs are monotonically increasing and never reused for the lifetime
/// of the process; they tag entity instances with their owning scope so
/// cross-scope attachment can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u64);

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

impl ScopeId {
    /// Allocates the next scope ID.
    pub(crate) fn next() -> Self {
        Self(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuilds a scope ID from its raw value.
    pub(crate) const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The tag value of a detached instance.
    pub(crate) const DETACHED: u64 = 0;
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

/// Tracking status of an entity instance within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    /// Attached but not yet flushed; will produce an insert.
    New,
    /// Tracked with a snapshot; mutations produce updates.
    Managed,
    /// Scheduled for deletion at the next flush.
    Removed,
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::New => f.write_str("new"),
            EntityStatus::Managed => f.write_str("managed"),
            EntityStatus::Removed => f.write_str("removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_ids_increase() {
        let a = ScopeId::next();
        let b = ScopeId::next();
        assert!(b > a);
    }

    #[test]
    fn scope_id_display() {
        let id = ScopeId::next();
        assert_eq!(format!("{id}"), format!("scope:{}", id.as_u64()));
    }

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", EntityStatus::New), "new");
        assert_eq!(format!("{}", EntityStatus::Managed), "managed");
        assert_eq!(format!("{}", EntityStatus::Removed), "removed");
    }
}
