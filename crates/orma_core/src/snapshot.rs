//! Snapshot store and field-level diffing.

use crate::entity::Entity;
use orma_model::{Key, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The captured target of an association field.
///
/// Only the resolved reference is recorded, never the target's contents:
/// its key when one was assigned at capture time, plus the instance handle
/// so a target that receives its key after capture still compares equal to
/// itself. Retaining the handle keeps the instance alive for the snapshot's
/// lifetime, so instance identity is never confused with a later allocation.
#[derive(Debug, Clone)]
pub(crate) struct RefTarget {
    target: Entity,
    key: Option<Key>,
}

impl RefTarget {
    fn of(entity: &Entity) -> Self {
        Self {
            target: entity.clone(),
            key: entity.key(),
        }
    }
}

impl PartialEq for RefTarget {
    fn eq(&self, other: &Self) -> bool {
        // Two targets with assigned keys are the same association value
        // when the keys match, regardless of which instance carries them.
        // Unkeyed targets compare by instance.
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            _ => Entity::same_instance(&self.target, &other.target),
        }
    }
}

/// An immutable field-value copy of one instance, taken when it became
/// managed.
#[derive(Debug, Clone)]
pub struct Snapshot {
    values: BTreeMap<String, Value>,
    refs: BTreeMap<String, Option<RefTarget>>,
    lists: BTreeMap<String, Vec<RefTarget>>,
}

impl Snapshot {
    /// Captures the persistent state of an instance.
    ///
    /// Scalar and embedded fields are deep-copied; association fields
    /// capture only the current resolved target; transient fields are
    /// skipped.
    #[must_use]
    pub fn take(entity: &Entity) -> Self {
        Self {
            values: entity.persistent_values(),
            refs: entity
                .reference_targets()
                .into_iter()
                .map(|(name, target)| (name, target.as_ref().map(RefTarget::of)))
                .collect(),
            lists: entity
                .list_targets()
                .into_iter()
                .map(|(name, targets)| (name, targets.iter().map(RefTarget::of).collect()))
                .collect(),
        }
    }

    /// Returns the names of fields whose current value is not structurally
    /// equal to the captured one.
    ///
    /// A collection-valued association counts as changed when its
    /// membership (targets, in order) differs from the captured membership.
    #[must_use]
    pub fn diff(&self, entity: &Entity) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();

        let current = entity.persistent_values();
        for name in self.values.keys().chain(current.keys()) {
            if self.values.get(name) != current.get(name) {
                changed.insert(name.clone());
            }
        }

        for (name, target) in entity.reference_targets() {
            let now = target.as_ref().map(RefTarget::of);
            if self.refs.get(&name) != Some(&now) {
                changed.insert(name);
            }
        }

        for (name, targets) in entity.list_targets() {
            let now: Vec<RefTarget> = targets.iter().map(RefTarget::of).collect();
            if self.lists.get(&name) != Some(&now) {
                changed.insert(name);
            }
        }

        changed
    }
}

/// Holds one snapshot per managed instance of a scope.
///
/// Snapshots are keyed by instance (not identity) so they stay addressable
/// while a store-assigned key is still pending.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<usize, Snapshot>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures and stores a snapshot of the instance, replacing any
    /// previous one.
    pub fn capture(&mut self, entity: &Entity) {
        self.snapshots.insert(entity.ptr_token(), Snapshot::take(entity));
    }

    /// Returns the snapshot of an instance, if one was captured.
    #[must_use]
    pub fn get(&self, entity: &Entity) -> Option<&Snapshot> {
        self.snapshots.get(&entity.ptr_token())
    }

    /// Diffs an instance against its snapshot.
    ///
    /// An instance without a snapshot reports no changes; new instances
    /// are handled by status, not by diffing.
    #[must_use]
    pub fn diff(&self, entity: &Entity) -> BTreeSet<String> {
        self.get(entity)
            .map(|s| s.diff(entity))
            .unwrap_or_default()
    }

    /// Discards the snapshot of an instance. Absent is a no-op.
    pub fn remove(&mut self, entity: &Entity) {
        self.snapshots.remove(&entity.ptr_token());
    }

    /// Discards all snapshots.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Returns the number of held snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if no snapshots are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
