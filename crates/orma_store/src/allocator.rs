//! Key allocator trait and in-memory implementation.

use crate::error::StoreResult;
use orma_model::TypeName;
use std::collections::HashMap;

/// Reserves contiguous blocks of integer keys per entity type.
///
/// This is the sequence-style collaborator for the pre-allocated-key mode:
/// one round trip reserves `size` consecutive keys, amortizing allocation
/// cost. The engine consumes the block locally and comes back only when it
/// runs out.
///
/// # Invariants
///
/// - Blocks never overlap: two calls for the same type return disjoint ranges
/// - Returned keys start at the returned value and run for `size` entries
pub trait KeyAllocator: Send {
    /// Reserves a block of `size` keys for `type_name`.
    ///
    /// Returns the first key of the reserved block.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator's backing store cannot be reached.
    fn allocate_block(&mut self, type_name: &TypeName, size: u32) -> StoreResult<i64>;
}

/// An in-memory sequence allocator.
///
/// Keeps one monotonically increasing counter per entity type, starting
/// at 1. Suitable for tests and single-process use.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: HashMap<TypeName, i64>,
}

impl SequenceAllocator {
    /// Creates a new allocator with all sequences at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unreserved key for a type, without reserving it.
    #[must_use]
    pub fn peek(&self, type_name: &TypeName) -> i64 {
        self.next.get(type_name).copied().unwrap_or(1)
    }
}

impl KeyAllocator for SequenceAllocator {
    fn allocate_block(&mut self, type_name: &TypeName, size: u32) -> StoreResult<i64> {
        let next = self.next.entry(type_name.clone()).or_insert(1);
        let start = *next;
        *next += i64::from(size.max(1));
        Ok(start)
    }
}
