//! Primary keys and entity identity.

use crate::schema::TypeName;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A primary-key value.
///
/// Keys are compared by value. Integer keys are what the store-assigned and
/// block-allocated generation modes produce; uuid and text keys are always
/// caller-assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Signed integer key (sequences, auto-increment).
    Int(i64),
    /// Random uuid key.
    Uuid(Uuid),
    /// Text key (natural keys).
    Text(String),
}

impl Key {
    /// Creates a fresh random uuid key.
    #[must_use]
    pub fn new_uuid() -> Self {
        Key::Uuid(Uuid::new_v4())
    }

    /// Returns the integer value, if this is an integer key.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Uuid(u) => write!(f, "{u}"),
            Key::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<Uuid> for Key {
    fn from(v: Uuid) -> Self {
        Key::Uuid(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_owned())
    }
}

/// The identity of an entity: (type, primary key).
///
/// Within one unit-of-work scope at most one live instance exists per
/// identity. An entity without an assigned key has no identity yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    type_name: TypeName,
    key: Key,
}

impl IdentityKey {
    /// Creates an identity key.
    pub fn new(type_name: TypeName, key: impl Into<Key>) -> Self {
        Self {
            type_name,
            key: key.into(),
        }
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Returns the primary-key value.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.key)
    }
}
