//! # orma Model
//!
//! Dynamic value and entity-shape model for orma.
//!
//! This crate provides:
//! - [`Value`] - a dynamic field value with structural equality
//! - [`Row`] - an ordered field-name/value map, the unit sent to a store
//! - [`Key`] and [`IdentityKey`] - primary keys and scoped entity identity
//! - [`EntityType`] - runtime type descriptors (field names, kinds, key field)
//! - [`KeyGen`] - identifier-generation modes
//!
//! Entity shapes are described at runtime by descriptors rather than
//! compile-time reflection; the engine in `orma_core` operates generically
//! over them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod key;
mod schema;
mod value;

pub use key::{IdentityKey, Key};
pub use schema::{
    EntityType, EntityTypeBuilder, FieldDef, FieldKind, KeyGen, TypeName, DEFAULT_BLOCK_SIZE,
};
pub use value::{Row, Value};
