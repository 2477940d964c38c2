//! In-memory store executor for testing.

use crate::error::{StoreError, StoreResult};
use crate::executor::{ExecuteOutcome, StoreExecutor};
use crate::ops::StoreOp;
use orma_model::{Key, Row, TypeName};
use std::collections::{BTreeMap, HashMap};

/// An in-memory store executor.
///
/// Rows live in per-type tables keyed by primary key. The store keeps a
/// journal of every applied operation (with resolved keys) so tests can
/// assert exactly what reached the store and in which order. Inserts
/// submitted without a key are assigned one from a per-type auto-increment
/// counter, mirroring store-assigned key generation.
///
/// # Example
///
/// ```rust
/// use orma_model::{Row, TypeName, Value};
/// use orma_store::{MemoryStore, StoreExecutor, StoreOp};
///
/// let mut store = MemoryStore::new();
/// store
///     .execute(&StoreOp::Insert {
///         type_name: TypeName::new("Member"),
///         key: None,
///         row: Row::new().with("username", Value::text("A")),
///     })
///     .unwrap();
/// assert_eq!(store.journal().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<TypeName, BTreeMap<Key, Row>>,
    counters: HashMap<TypeName, i64>,
    journal: Vec<StoreOp>,
    fail_next: Option<StoreError>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the journal of applied operations, in application order.
    ///
    /// Insert entries carry their resolved key even when the submission
    /// left it to the store.
    #[must_use]
    pub fn journal(&self) -> &[StoreOp] {
        &self.journal
    }

    /// Clears the journal without touching the tables.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Returns a row by type and key.
    #[must_use]
    pub fn get(&self, type_name: &TypeName, key: &Key) -> Option<&Row> {
        self.tables.get(type_name)?.get(key)
    }

    /// Returns all rows of a type in key order.
    #[must_use]
    pub fn rows(&self, type_name: &TypeName) -> Vec<(Key, Row)> {
        self.tables
            .get(type_name)
            .map(|t| t.iter().map(|(k, r)| (k.clone(), r.clone())).collect())
            .unwrap_or_default()
    }

    /// Returns the number of rows of a type.
    #[must_use]
    pub fn row_count(&self, type_name: &TypeName) -> usize {
        self.tables.get(type_name).map_or(0, BTreeMap::len)
    }

    /// Makes the next `execute` call fail with `err`.
    ///
    /// The failure is one-shot; subsequent operations succeed again.
    pub fn fail_next_op(&mut self, err: StoreError) {
        self.fail_next = Some(err);
    }

    fn next_key(&mut self, type_name: &TypeName) -> Key {
        let counter = self.counters.entry(type_name.clone()).or_insert(0);
        *counter += 1;
        Key::Int(*counter)
    }
}

impl StoreExecutor for MemoryStore {
    fn execute(&mut self, op: &StoreOp) -> StoreResult<ExecuteOutcome> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }

        match op {
            StoreOp::Insert {
                type_name,
                key,
                row,
            } => {
                let (resolved, outcome) = match key {
                    Some(k) => (k.clone(), ExecuteOutcome::none()),
                    None => {
                        let generated = self.next_key(type_name);
                        (generated.clone(), ExecuteOutcome::generated(generated))
                    }
                };

                let table = self.tables.entry(type_name.clone()).or_default();
                if table.contains_key(&resolved) {
                    return Err(StoreError::DuplicateKey {
                        type_name: type_name.clone(),
                        key: resolved,
                    });
                }
                table.insert(resolved.clone(), row.clone());

                self.journal.push(StoreOp::Insert {
                    type_name: type_name.clone(),
                    key: Some(resolved),
                    row: row.clone(),
                });
                Ok(outcome)
            }
            StoreOp::Update {
                type_name,
                key,
                changed,
            } => {
                let row = self
                    .tables
                    .get_mut(type_name)
                    .and_then(|t| t.get_mut(key))
                    .ok_or_else(|| StoreError::RowNotFound {
                        type_name: type_name.clone(),
                        key: key.clone(),
                    })?;
                for (name, value) in changed {
                    row.set(name.clone(), value.clone());
                }
                self.journal.push(op.clone());
                Ok(ExecuteOutcome::none())
            }
            StoreOp::Delete { type_name, key } => {
                let removed = self
                    .tables
                    .get_mut(type_name)
                    .and_then(|t| t.remove(key))
                    .is_some();
                if !removed {
                    return Err(StoreError::RowNotFound {
                        type_name: type_name.clone(),
                        key: key.clone(),
                    });
                }
                self.journal.push(op.clone());
                Ok(ExecuteOutcome::none())
            }
        }
    }
}
