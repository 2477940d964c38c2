//! Dynamic field values and rows.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// A dynamic field value.
///
/// Values carry the persistent state of one entity field. Equality is
/// structural (`PartialEq` compares contents, never references), which is
/// what snapshot diffing relies on: a field counts as changed exactly when
/// its current value is not structurally equal to its snapshotted value.
///
/// Floats are intentionally not supported so that `Eq` holds and diff
/// results are never ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Null / absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Ordered collection of values (element collections).
    Array(Vec<Value>),
    /// An embedded value object: named components compared as a whole.
    ///
    /// Components are kept sorted by name so two embedded values built in
    /// different orders still compare equal.
    Embedded(Vec<(String, Value)>),
    /// A foreign-key reference to another entity, by primary key.
    Key(Key),
}

impl Value {
    /// Creates an embedded value with components sorted by name.
    #[must_use]
    pub fn embedded(mut components: Vec<(String, Value)>) -> Self {
        components.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Embedded(components)
    }

    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns `true` if this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the contained integer, if this is an integer value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the contained text, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the referenced key, if this is a key value.
    #[must_use]
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Key> for Value {
    fn from(v: Key) -> Self {
        Value::Key(v)
    }
}

/// An ordered field-name/value map.
///
/// Rows are the unit handed to a store executor: the materialized persistent
/// state of one entity (insert) or the subset of changed fields (update).
/// Iteration order is the field-name order, so rows are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Builder-style `set`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Gets a field value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns `true` if the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the row contains the named field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Returns the field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        assert_eq!(Value::from(10), Value::Integer(10));
        assert_eq!(Value::text("a"), Value::Text("a".into()));
        assert_ne!(Value::from(10), Value::from(11));
        assert_ne!(Value::Null, Value::Integer(0));
    }

    #[test]
    fn embedded_components_sorted() {
        let a = Value::embedded(vec![
            ("street".into(), Value::text("main")),
            ("city".into(), Value::text("seoul")),
        ]);
        let b = Value::embedded(vec![
            ("city".into(), Value::text("seoul")),
            ("street".into(), Value::text("main")),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn embedded_differs_by_component() {
        let a = Value::embedded(vec![("city".into(), Value::text("seoul"))]);
        let b = Value::embedded(vec![("city".into(), Value::text("busan"))]);
        assert_ne!(a, b);
    }

    #[test]
    fn array_membership_is_structural() {
        let a = Value::Array(vec![Value::from(1), Value::from(2)]);
        let b = Value::Array(vec![Value::from(1), Value::from(2)]);
        let c = Value::Array(vec![Value::from(2), Value::from(1)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn row_iterates_in_name_order() {
        let row = Row::new()
            .with("username", Value::text("A"))
            .with("age", Value::from(10));
        let names: Vec<_> = row.field_names().collect();
        assert_eq!(names, vec!["age", "username"]);
    }

    #[test]
    fn row_get_and_contains() {
        let row = Row::new().with("age", Value::from(10));
        assert!(row.contains("age"));
        assert_eq!(row.get("age"), Some(&Value::Integer(10)));
        assert!(row.get("missing").is_none());
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::from(7).as_integer(), Some(7));
        assert_eq!(Value::text("x").as_text(), Some("x"));
        assert!(Value::Null.is_null());
        assert!(Value::text("x").as_integer().is_none());
    }

    #[test]
    fn serde_round_trip() {
        let row = Row::new()
            .with("name", Value::text("ZZZZ"))
            .with("team", Value::Key(Key::Int(3)));
        let json = serde_json::to_string(&row).unwrap();
        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(row, back);
    }
}
