//! Runtime entity-type descriptors.
//!
//! An [`EntityType`] describes one entity shape: its name, key field,
//! identifier-generation mode, and persistent fields. The engine operates
//! generically over descriptors instead of relying on reflection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default block size for allocated keys.
pub const DEFAULT_BLOCK_SIZE: u32 = 50;

/// Name of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeName(String);

impl TypeName {
    /// Creates a type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier-generation mode for an entity type.
///
/// The mode determines how the write-behind queue may buffer inserts:
/// pre-known keys batch freely, store-assigned keys force the insert to run
/// before anything that depends on the generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyGen {
    /// The caller assigns the key before attaching the instance.
    Assigned,
    /// Keys are pre-allocated in contiguous blocks from an external
    /// allocator (sequence-style). The key is known before the insert is
    /// queued, so inserts buffer and batch normally.
    Allocated {
        /// Keys reserved per allocator round trip.
        block_size: u32,
    },
    /// The store assigns the key when the insert executes
    /// (auto-increment-style). The key is unknown until then.
    StoreAssigned,
}

/// Kind of a persistent field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Plain scalar value (integer, text, bytes, bool, array, embedded).
    Scalar,
    /// Embedded value object, compared as a whole.
    Embedded,
    /// To-one association owning a foreign key to `target`.
    Reference {
        /// Type the foreign key points at.
        target: TypeName,
    },
    /// To-many association owning a collection of foreign keys to `target`.
    ///
    /// The inverse (non-owning) side of an association is never declared as
    /// a field; it is recomputed from the identity registry.
    ReferenceList {
        /// Type the foreign keys point at.
        target: TypeName,
    },
}

/// One field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Transient fields are settable but never snapshotted or persisted.
    pub transient: bool,
}

impl FieldDef {
    /// Creates a scalar field definition.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            transient: false,
        }
    }
}

/// Runtime descriptor for one entity type.
///
/// The key field is implicit: it is tracked separately from the field list
/// and is not part of snapshots or dirty checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    name: TypeName,
    key_field: String,
    key_gen: KeyGen,
    fields: Vec<FieldDef>,
}

impl EntityType {
    /// Starts building a descriptor for the named type.
    ///
    /// Defaults: key field `"id"`, [`KeyGen::Assigned`], no fields.
    pub fn builder(name: impl Into<TypeName>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            key_field: "id".to_owned(),
            key_gen: KeyGen::Assigned,
            fields: Vec::new(),
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// Returns the name of the key field.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Returns the identifier-generation mode.
    #[must_use]
    pub fn key_gen(&self) -> KeyGen {
        self.key_gen
    }

    /// Returns all declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field definition by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterates the persistent (non-transient) fields.
    pub fn persistent_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.transient)
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: TypeName,
    key_field: String,
    key_gen: KeyGen,
    fields: Vec<FieldDef>,
}

impl EntityTypeBuilder {
    /// Sets the key field name.
    #[must_use]
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = name.into();
        self
    }

    /// Uses caller-assigned keys.
    #[must_use]
    pub fn assigned_key(mut self) -> Self {
        self.key_gen = KeyGen::Assigned;
        self
    }

    /// Uses block-allocated keys with the default block size.
    #[must_use]
    pub fn allocated_key(self) -> Self {
        self.allocated_key_with_block(DEFAULT_BLOCK_SIZE)
    }

    /// Uses block-allocated keys with an explicit block size.
    #[must_use]
    pub fn allocated_key_with_block(mut self, block_size: u32) -> Self {
        self.key_gen = KeyGen::Allocated {
            block_size: block_size.max(1),
        };
        self
    }

    /// Uses store-assigned keys.
    #[must_use]
    pub fn store_assigned_key(mut self) -> Self {
        self.key_gen = KeyGen::StoreAssigned;
        self
    }

    /// Adds a scalar field.
    #[must_use]
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef::scalar(name));
        self
    }

    /// Adds a transient field (settable, never persisted).
    #[must_use]
    pub fn transient(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Scalar,
            transient: true,
        });
        self
    }

    /// Adds an embedded value field.
    #[must_use]
    pub fn embedded(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Embedded,
            transient: false,
        });
        self
    }

    /// Adds an owning to-one association field.
    #[must_use]
    pub fn reference(mut self, name: impl Into<String>, target: impl Into<TypeName>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Reference {
                target: target.into(),
            },
            transient: false,
        });
        self
    }

    /// Adds an owning to-many association field (a collection of keys).
    #[must_use]
    pub fn reference_list(mut self, name: impl Into<String>, target: impl Into<TypeName>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::ReferenceList {
                target: target.into(),
            },
            transient: false,
        });
        self
    }

    /// Appends shared field definitions (audit columns and the like that a
    /// family of types has in common).
    #[must_use]
    pub fn compose(mut self, shared: &[FieldDef]) -> Self {
        self.fields.extend_from_slice(shared);
        self
    }

    /// Finishes the descriptor.
    #[must_use]
    pub fn build(self) -> EntityType {
        EntityType {
            name: self.name,
            key_field: self.key_field,
            key_gen: self.key_gen,
            fields: self.fields,
        }
    }
}
