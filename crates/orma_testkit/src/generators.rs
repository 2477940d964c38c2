//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values, and rows that respect
//! the model's invariants (no floats, embedded components sorted by name).

use orma_model::{Key, Row, Value};
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for generating valid field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("valid regex")
}

/// Strategy for generating primary keys of every kind.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        any::<i64>().prop_map(Key::Int),
        prop::array::uniform16(any::<u8>()).prop_map(|b| Key::Uuid(Uuid::from_bytes(b))),
        prop::string::string_regex("[a-z]{1,12}")
            .expect("valid regex")
            .prop_map(Key::Text),
    ]
}

/// Strategy for generating scalar (non-nested) values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        prop::string::string_regex("[ -~]{0,24}")
            .expect("valid regex")
            .prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        key_strategy().prop_map(Value::Key),
    ]
}

/// Strategy for generating values, including nested arrays and embedded
/// value objects.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((field_name_strategy(), inner), 0..4)
                .prop_map(Value::embedded),
        ]
    })
}

/// Strategy for generating rows.
pub fn row_strategy() -> impl Strategy<Value = Row> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}
