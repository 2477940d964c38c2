//! Error types for store operations.

use orma_model::{Key, TypeName};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a store executor or key allocator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A constraint was violated (unique, not-null, foreign key).
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint.
        message: String,
    },

    /// An insert collided with an existing primary key.
    #[error("duplicate key {key} for {type_name}")]
    DuplicateKey {
        /// Entity type of the insert.
        type_name: TypeName,
        /// The colliding key.
        key: Key,
    },

    /// An update or delete targeted a row that does not exist.
    #[error("row {key} not found in {type_name}")]
    RowNotFound {
        /// Entity type of the operation.
        type_name: TypeName,
        /// The missing key.
        key: Key,
    },

    /// The store could not be reached.
    #[error("store connection failed: {message}")]
    Connection {
        /// Description of the connectivity failure.
        message: String,
    },

    /// The store refused the operation (shutdown, read-only, timeout).
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of why the store is unavailable.
        message: String,
    },
}

impl StoreError {
    /// Creates a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
