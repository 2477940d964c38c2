//! Store executor trait definition.

use crate::error::StoreResult;
use crate::ops::StoreOp;
use orma_model::Key;

/// Outcome of executing one store operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecuteOutcome {
    /// Key generated by the store, for inserts submitted without one.
    pub generated_key: Option<Key>,
}

impl ExecuteOutcome {
    /// Outcome with no generated key.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Outcome carrying a store-generated key.
    #[must_use]
    pub fn generated(key: Key) -> Self {
        Self {
            generated_key: Some(key),
        }
    }
}

/// Applies operations against persistent storage.
///
/// The unit-of-work engine submits the operations of one flush batch
/// one at a time, in commit order. Executors are **dumb appliers**: they do
/// not reorder, buffer, or retry, and they hold no engine state.
///
/// # Invariants
///
/// - Operations are applied exactly as submitted, in submission order
/// - An [`StoreOp::Insert`] with `key: None` must assign a key and return it
///   in [`ExecuteOutcome::generated_key`], synchronously
/// - A failed operation must not undo previously applied operations; the
///   caller's transaction boundary issues the compensating rollback
/// - Executors must be `Send` so a factory can share one behind a lock
///
/// # Implementors
///
/// - [`super::MemoryStore`] - for tests and ephemeral storage
pub trait StoreExecutor: Send {
    /// Applies one operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation violates a store constraint or the
    /// store cannot be reached. The error is keyed to this operation only.
    fn execute(&mut self, op: &StoreOp) -> StoreResult<ExecuteOutcome>;
}
