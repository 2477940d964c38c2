//! Store operations.

use orma_model::{Key, Row, TypeName};
use std::fmt;

/// One operation submitted to a store executor.
///
/// Operations are materialized by the engine at drain time: rows contain
/// resolved values only (foreign keys are concrete [`Key`]s, never in-memory
/// references).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Insert a new row.
    Insert {
        /// Entity type.
        type_name: TypeName,
        /// Primary key; `None` when the store assigns it.
        key: Option<Key>,
        /// Full persistent state of the entity.
        row: Row,
    },
    /// Update the named fields of an existing row.
    Update {
        /// Entity type.
        type_name: TypeName,
        /// Primary key of the row.
        key: Key,
        /// Changed fields only.
        changed: Row,
    },
    /// Delete an existing row.
    Delete {
        /// Entity type.
        type_name: TypeName,
        /// Primary key of the row.
        key: Key,
    },
}

impl StoreOp {
    /// Returns the entity type this operation targets.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        match self {
            StoreOp::Insert { type_name, .. }
            | StoreOp::Update { type_name, .. }
            | StoreOp::Delete { type_name, .. } => type_name,
        }
    }

    /// Returns the primary key, if known.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        match self {
            StoreOp::Insert { key, .. } => key.as_ref(),
            StoreOp::Update { key, .. } | StoreOp::Delete { key, .. } => Some(key),
        }
    }

    /// Returns `true` for inserts.
    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(self, StoreOp::Insert { .. })
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Insert { type_name, key, .. } => match key {
                Some(k) => write!(f, "insert {type_name}#{k}"),
                None => write!(f, "insert {type_name}#?"),
            },
            StoreOp::Update {
                type_name,
                key,
                changed,
            } => {
                write!(f, "update {type_name}#{key} [")?;
                for (i, name) in changed.field_names().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                }
                f.write_str("]")
            }
            StoreOp::Delete { type_name, key } => write!(f, "delete {type_name}#{key}"),
        }
    }
}
