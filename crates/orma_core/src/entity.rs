//! Entity instances.
//!
//! An [`Entity`] is a cheap-to-clone handle (`Arc`) to one mutable entity
//! instance described by an [`EntityType`] descriptor. Callers mutate fields
//! directly through the handle; the unit of work observes those mutations
//! later by diffing against snapshots.
//!
//! Association fields hold handles to their target instances, not keys, so
//! a reference to an entity whose key the store has not assigned yet is
//! legal. Foreign keys are resolved when rows are materialized at drain
//! time. The inverse side of an association is never stored on an instance;
//! it is recomputed from the identity registry
//! (see [`crate::UnitOfWork::referencing`]), which also keeps instance
//! graphs acyclic.

use crate::error::{CoreError, CoreResult};
use crate::types::ScopeId;
use orma_model::{EntityType, FieldDef, FieldKind, IdentityKey, Key, Row, TypeName, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A handle to one entity instance.
///
/// Clones share the same underlying instance; [`Entity::same_instance`]
/// tests reference identity, which is what the identity-map guarantee is
/// stated in terms of.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<Inner>,
}

struct Inner {
    descriptor: Arc<EntityType>,
    /// Owning scope tag; [`ScopeId::DETACHED`] when detached.
    owner: AtomicU64,
    data: RwLock<Data>,
}

#[derive(Default)]
struct Data {
    key: Option<Key>,
    values: BTreeMap<String, Value>,
    refs: BTreeMap<String, Entity>,
    lists: BTreeMap<String, Vec<Entity>>,
}

impl Entity {
    /// Creates a new detached instance of the described type.
    #[must_use]
    pub fn new(descriptor: Arc<EntityType>) -> Self {
        Self {
            inner: Arc::new(Inner {
                descriptor,
                owner: AtomicU64::new(ScopeId::DETACHED),
                data: RwLock::new(Data::default()),
            }),
        }
    }

    /// Returns the descriptor of this instance.
    #[must_use]
    pub fn entity_type(&self) -> Arc<EntityType> {
        Arc::clone(&self.inner.descriptor)
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        self.inner.descriptor.name()
    }

    /// Returns the primary key, if assigned.
    #[must_use]
    pub fn key(&self) -> Option<Key> {
        self.inner.data.read().key.clone()
    }

    /// Returns the identity of this instance, once it has a key.
    #[must_use]
    pub fn identity(&self) -> Option<IdentityKey> {
        self.key()
            .map(|k| IdentityKey::new(self.type_name().clone(), k))
    }

    /// Assigns the primary key.
    ///
    /// Keys are write-once: assigning an equal key again is a no-op,
    /// assigning a different one fails.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KeyImmutable`] if a different key is already
    /// assigned.
    pub fn set_key(&self, key: impl Into<Key>) -> CoreResult<()> {
        let key = key.into();
        let mut data = self.inner.data.write();
        match &data.key {
            None => {
                data.key = Some(key);
                Ok(())
            }
            Some(existing) if *existing == key => Ok(()),
            Some(_) => Err(CoreError::KeyImmutable {
                type_name: self.type_name().clone(),
            }),
        }
    }

    /// Writes back a store-generated key. Internal: bypasses the
    /// write-once check because drain owns key assignment.
    pub(crate) fn assign_key(&self, key: Key) {
        self.inner.data.write().key = Some(key);
    }

    /// Reads a scalar or embedded field.
    ///
    /// Unset fields read as [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] for undeclared fields and
    /// [`CoreError::FieldKindMismatch`] for association fields.
    pub fn get(&self, field: &str) -> CoreResult<Value> {
        self.expect_value_field(field)?;
        Ok(self
            .inner
            .data
            .read()
            .values
            .get(field)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Writes a scalar or embedded field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] for undeclared fields and
    /// [`CoreError::FieldKindMismatch`] for association fields.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.expect_value_field(field)?;
        self.inner
            .data
            .write()
            .values
            .insert(field.to_owned(), value.into());
        Ok(())
    }

    /// Reads a to-one association field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] or
    /// [`CoreError::FieldKindMismatch`] if the field is not a to-one
    /// association.
    pub fn reference(&self, field: &str) -> CoreResult<Option<Entity>> {
        self.expect_reference_field(field)?;
        Ok(self.inner.data.read().refs.get(field).cloned())
    }

    /// Writes a to-one association field. `None` clears it.
    ///
    /// # Errors
    ///
    /// Fails for undeclared or non-association fields, and with
    /// [`CoreError::FieldKindMismatch`] when the target instance is not of
    /// the declared target type.
    pub fn set_reference(&self, field: &str, target: Option<&Entity>) -> CoreResult<()> {
        let expected = self.expect_reference_field(field)?;
        let mut data = self.inner.data.write();
        match target {
            Some(t) => {
                if t.type_name() != &expected {
                    return Err(CoreError::field_kind_mismatch(
                        self.type_name().clone(),
                        field,
                    ));
                }
                data.refs.insert(field.to_owned(), t.clone());
            }
            None => {
                data.refs.remove(field);
            }
        }
        Ok(())
    }

    /// Reads a to-many association field.
    ///
    /// # Errors
    ///
    /// Fails for undeclared or non-collection fields.
    pub fn reference_list(&self, field: &str) -> CoreResult<Vec<Entity>> {
        self.expect_list_field(field)?;
        Ok(self
            .inner
            .data
            .read()
            .lists
            .get(field)
            .cloned()
            .unwrap_or_default())
    }

    /// Appends a target to a to-many association field.
    ///
    /// # Errors
    ///
    /// Fails for undeclared or non-collection fields, and for a target of
    /// the wrong type.
    pub fn push_reference(&self, field: &str, target: &Entity) -> CoreResult<()> {
        let expected = self.expect_list_field(field)?;
        if target.type_name() != &expected {
            return Err(CoreError::field_kind_mismatch(
                self.type_name().clone(),
                field,
            ));
        }
        self.inner
            .data
            .write()
            .lists
            .entry(field.to_owned())
            .or_default()
            .push(target.clone());
        Ok(())
    }

    /// Removes a target (by instance identity) from a to-many association.
    /// Removing an absent target is a no-op.
    ///
    /// # Errors
    ///
    /// Fails for undeclared or non-collection fields.
    pub fn remove_reference(&self, field: &str, target: &Entity) -> CoreResult<()> {
        self.expect_list_field(field)?;
        if let Some(list) = self.inner.data.write().lists.get_mut(field) {
            list.retain(|e| !Entity::same_instance(e, target));
        }
        Ok(())
    }

    /// Tests whether two handles point at the same instance.
    #[must_use]
    pub fn same_instance(a: &Entity, b: &Entity) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// A token identifying this instance for the lifetime of the handle.
    pub(crate) fn ptr_token(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Materializes the full persistent state as a row.
    ///
    /// Reference fields resolve to their target's key; transient fields are
    /// skipped; unset fields materialize as null.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingKey`] if a referenced instance has no
    /// key yet.
    pub fn to_row(&self) -> CoreResult<Row> {
        let names: BTreeSet<String> = self
            .inner
            .descriptor
            .persistent_fields()
            .map(|f| f.name.clone())
            .collect();
        self.row_of(&names)
    }

    /// Materializes a subset of persistent fields as a row.
    ///
    /// # Errors
    ///
    /// As [`Entity::to_row`]; transient fields in `fields` are skipped.
    pub fn row_of(&self, fields: &BTreeSet<String>) -> CoreResult<Row> {
        let data = self.inner.data.read();
        let mut row = Row::new();
        for def in self.inner.descriptor.persistent_fields() {
            if !fields.contains(&def.name) {
                continue;
            }
            let value = match &def.kind {
                FieldKind::Scalar | FieldKind::Embedded => {
                    data.values.get(&def.name).cloned().unwrap_or(Value::Null)
                }
                FieldKind::Reference { .. } => match data.refs.get(&def.name) {
                    Some(target) => Value::Key(Self::resolved_key(target)?),
                    None => Value::Null,
                },
                FieldKind::ReferenceList { .. } => {
                    let targets = data.lists.get(&def.name).map(Vec::as_slice).unwrap_or(&[]);
                    let keys = targets
                        .iter()
                        .map(|t| Self::resolved_key(t).map(Value::Key))
                        .collect::<CoreResult<Vec<_>>>()?;
                    Value::Array(keys)
                }
            };
            row.set(def.name.clone(), value);
        }
        Ok(row)
    }

    fn resolved_key(target: &Entity) -> CoreResult<Key> {
        target
            .key()
            .ok_or_else(|| CoreError::missing_key(target.type_name().clone()))
    }

    /// Clones the currently stored persistent scalar/embedded values.
    pub(crate) fn persistent_values(&self) -> BTreeMap<String, Value> {
        let data = self.inner.data.read();
        self.inner
            .descriptor
            .persistent_fields()
            .filter(|f| matches!(f.kind, FieldKind::Scalar | FieldKind::Embedded))
            .filter_map(|f| data.values.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect()
    }

    /// Current targets of all declared to-one association fields.
    pub(crate) fn reference_targets(&self) -> BTreeMap<String, Option<Entity>> {
        let data = self.inner.data.read();
        self.inner
            .descriptor
            .persistent_fields()
            .filter(|f| matches!(f.kind, FieldKind::Reference { .. }))
            .map(|f| (f.name.clone(), data.refs.get(&f.name).cloned()))
            .collect()
    }

    /// Current targets of all declared to-many association fields.
    pub(crate) fn list_targets(&self) -> BTreeMap<String, Vec<Entity>> {
        let data = self.inner.data.read();
        self.inner
            .descriptor
            .persistent_fields()
            .filter(|f| matches!(f.kind, FieldKind::ReferenceList { .. }))
            .map(|f| {
                (
                    f.name.clone(),
                    data.lists.get(&f.name).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    pub(crate) fn owner(&self) -> u64 {
        self.inner.owner.load(Ordering::Acquire)
    }

    /// Claims this instance for `scope`.
    ///
    /// Returns `Ok(true)` when newly claimed, `Ok(false)` when the scope
    /// already owned it, and the owning scope on conflict.
    pub(crate) fn claim(&self, scope: ScopeId) -> Result<bool, ScopeId> {
        match self.inner.owner.compare_exchange(
            ScopeId::DETACHED,
            scope.as_u64(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(true),
            Err(current) if current == scope.as_u64() => Ok(false),
            Err(current) => Err(ScopeId::from_raw(current)),
        }
    }

    /// Releases this instance if `scope` owns it.
    pub(crate) fn release(&self, scope: ScopeId) {
        let _ = self.inner.owner.compare_exchange(
            scope.as_u64(),
            ScopeId::DETACHED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn field_def(&self, field: &str) -> CoreResult<&FieldDef> {
        self.inner
            .descriptor
            .field(field)
            .ok_or_else(|| CoreError::unknown_field(self.type_name().clone(), field))
    }

    fn expect_value_field(&self, field: &str) -> CoreResult<()> {
        let def = self.field_def(field)?;
        match def.kind {
            FieldKind::Scalar | FieldKind::Embedded => Ok(()),
            _ => Err(CoreError::field_kind_mismatch(
                self.type_name().clone(),
                field,
            )),
        }
    }

    fn expect_reference_field(&self, field: &str) -> CoreResult<TypeName> {
        let def = self.field_def(field)?;
        match &def.kind {
            FieldKind::Reference { target } => Ok(target.clone()),
            _ => Err(CoreError::field_kind_mismatch(
                self.type_name().clone(),
                field,
            )),
        }
    }

    fn expect_list_field(&self, field: &str) -> CoreResult<TypeName> {
        let def = self.field_def(field)?;
        match &def.kind {
            FieldKind::ReferenceList { target } => Ok(target.clone()),
            _ => Err(CoreError::field_kind_mismatch(
                self.type_name().clone(),
                field,
            )),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.data.read();
        let mut s = f.debug_struct("Entity");
        s.field("type", &self.type_name().as_str());
        match &data.key {
            Some(k) => s.field("key", &format_args!("{k}")),
            None => s.field("key", &format_args!("<unassigned>")),
        };
        // References print as the target's identity, never its contents.
        for (name, target) in &data.refs {
            match target.identity() {
                Some(id) => s.field(name, &format_args!("-> {id}")),
                None => s.field(name, &format_args!("-> <unkeyed {}>", target.type_name())),
            };
        }
        s.finish_non_exhaustive()
    }
}
