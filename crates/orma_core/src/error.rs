//! Error types for orma core.

use crate::types::ScopeId;
use crate::uow::ScopeState;
use orma_model::{IdentityKey, TypeName};
use orma_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in orma core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An attach collided with a different instance already bound to the
    /// same identity in this scope.
    #[error("duplicate identity: {identity} is already bound to another instance")]
    DuplicateIdentity {
        /// The colliding identity.
        identity: IdentityKey,
    },

    /// The operation requires a managed instance.
    #[error("instance of {type_name} is not managed by this scope")]
    NotManaged {
        /// Entity type of the offending instance.
        type_name: TypeName,
    },

    /// The instance is already attached to another live scope.
    #[error("instance of {type_name} is already attached to {owner}")]
    CrossScopeAttach {
        /// Entity type of the offending instance.
        type_name: TypeName,
        /// The scope that owns the instance.
        owner: ScopeId,
    },

    /// A mutating call was issued on a scope that can no longer accept it.
    #[error("scope is {state}; no further operations are accepted")]
    ScopeTerminated {
        /// The state the scope is in.
        state: ScopeState,
    },

    /// The store rejected one operation of a drain batch.
    ///
    /// Earlier operations of the batch were applied and are not undone
    /// here; the caller must roll back.
    #[error("store rejected operation #{index} ({op}): {source}")]
    StoreOperation {
        /// Zero-based position of the failed operation in the batch.
        index: usize,
        /// Description of the failed operation.
        op: String,
        /// The store's failure.
        #[source]
        source: StoreError,
    },

    /// The key allocator failed.
    #[error("key allocation failed: {0}")]
    Allocator(#[source] StoreError),

    /// An entity that must have a key does not have one.
    #[error("instance of {type_name} has no key assigned")]
    MissingKey {
        /// Entity type of the offending instance.
        type_name: TypeName,
    },

    /// A field name is not declared on the entity type.
    #[error("unknown field `{field}` on {type_name}")]
    UnknownField {
        /// Entity type.
        type_name: TypeName,
        /// The undeclared field name.
        field: String,
    },

    /// A field was accessed through the wrong kind of accessor
    /// (scalar access on an association field or vice versa).
    #[error("field `{field}` on {type_name} has a different kind")]
    FieldKindMismatch {
        /// Entity type.
        type_name: TypeName,
        /// The field name.
        field: String,
    },

    /// An already-assigned key cannot be changed.
    #[error("key of {type_name} instance is already assigned")]
    KeyImmutable {
        /// Entity type of the offending instance.
        type_name: TypeName,
    },
}

impl CoreError {
    /// Creates a duplicate identity error.
    pub fn duplicate_identity(identity: IdentityKey) -> Self {
        Self::DuplicateIdentity { identity }
    }

    /// Creates a not-managed error.
    pub fn not_managed(type_name: TypeName) -> Self {
        Self::NotManaged { type_name }
    }

    /// Creates a missing-key error.
    pub fn missing_key(type_name: TypeName) -> Self {
        Self::MissingKey { type_name }
    }

    /// Creates an unknown-field error.
    pub fn unknown_field(type_name: TypeName, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name,
            field: field.into(),
        }
    }

    /// Creates a field-kind mismatch error.
    pub fn field_kind_mismatch(type_name: TypeName, field: impl Into<String>) -> Self {
        Self::FieldKindMismatch {
            type_name,
            field: field.into(),
        }
    }
}
