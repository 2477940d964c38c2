//! Identity registry (first-level cache).

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use orma_model::IdentityKey;
use std::collections::HashMap;

/// Maps (entity-type, primary-key) to exactly one live instance.
///
/// For the lifetime of its scope, repeated lookups with equal keys return
/// handles to the same instance - the "same transaction, same object"
/// guarantee. Registration order is retained so dirty-check scans are
/// deterministic.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    entries: HashMap<IdentityKey, Entity>,
    order: Vec<IdentityKey>,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance under its identity.
    ///
    /// Re-registering the same instance under the same key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateIdentity`] if the key is already bound
    /// to a different instance.
    pub fn register(&mut self, identity: IdentityKey, entity: &Entity) -> CoreResult<()> {
        if let Some(existing) = self.entries.get(&identity) {
            if Entity::same_instance(existing, entity) {
                return Ok(());
            }
            return Err(CoreError::duplicate_identity(identity));
        }
        self.entries.insert(identity.clone(), entity.clone());
        self.order.push(identity);
        Ok(())
    }

    /// Looks up the instance bound to an identity.
    ///
    /// Absence is not an error.
    #[must_use]
    pub fn lookup(&self, identity: &IdentityKey) -> Option<Entity> {
        self.entries.get(identity).cloned()
    }

    /// Removes an identity binding. Removing an absent key is a no-op.
    pub fn remove(&mut self, identity: &IdentityKey) {
        if self.entries.remove(identity).is_some() {
            self.order.retain(|k| k != identity);
        }
    }

    /// Returns `true` if the identity is bound.
    #[must_use]
    pub fn contains(&self, identity: &IdentityKey) -> bool {
        self.entries.contains_key(identity)
    }

    /// Iterates entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &Entity)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|e| (k, e)))
    }

    /// Returns the number of bound identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no identities are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all bindings.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orma_model::{EntityType, TypeName};
    use std::sync::Arc;

    fn member(key: i64) -> (IdentityKey, Entity) {
        let ty = Arc::new(EntityType::builder("Member").scalar("username").build());
        let e = Entity::new(ty);
        e.set_key(key).unwrap();
        (IdentityKey::new(TypeName::new("Member"), key), e)
    }

    #[test]
    fn lookup_returns_same_instance() {
        let mut reg = IdentityRegistry::new();
        let (id, e) = member(1);
        reg.register(id.clone(), &e).unwrap();

        let a = reg.lookup(&id).unwrap();
        let b = reg.lookup(&id).unwrap();
        assert!(Entity::same_instance(&a, &e));
        assert!(Entity::same_instance(&a, &b));
    }

    #[test]
    fn duplicate_registration_of_same_instance_is_noop() {
        let mut reg = IdentityRegistry::new();
        let (id, e) = member(1);
        reg.register(id.clone(), &e).unwrap();
        reg.register(id, &e).unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn different_instance_same_key_rejected() {
        let mut reg = IdentityRegistry::new();
        let (id, e1) = member(1);
        let (_, e2) = member(1);
        reg.register(id.clone(), &e1).unwrap();

        let result = reg.register(id, &e2);
        assert!(matches!(result, Err(CoreError::DuplicateIdentity { .. })));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = IdentityRegistry::new();
        let (id, e) = member(1);
        reg.register(id.clone(), &e).unwrap();

        reg.remove(&id);
        assert!(reg.lookup(&id).is_none());
        reg.remove(&id); // no-op
        assert!(reg.is_empty());
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut reg = IdentityRegistry::new();
        let (id3, e3) = member(3);
        let (id1, e1) = member(1);
        let (id2, e2) = member(2);
        reg.register(id3.clone(), &e3).unwrap();
        reg.register(id1, &e1).unwrap();
        reg.register(id2, &e2).unwrap();

        let keys: Vec<String> = reg.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["Member#3", "Member#1", "Member#2"]);
    }
}
