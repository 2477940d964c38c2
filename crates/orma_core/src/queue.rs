//! Write-behind operation queue.
//!
//! Pending operations reference live entity instances instead of carrying
//! pre-rendered rows. Rows are materialized one by one while the queue
//! drains, after the operations they depend on have executed, so a foreign
//! key to an instance whose key the store assigns during the same batch
//! resolves to the generated value.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use orma_store::{StoreExecutor, StoreOp};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, trace};

/// One queued write, recorded when the scope flushed.
#[derive(Debug, Clone)]
pub enum PendingOp {
    /// Insert the full persistent state of a new instance.
    Insert {
        /// The instance to insert.
        entity: Entity,
    },
    /// Update the named fields of a managed instance.
    Update {
        /// The instance to update.
        entity: Entity,
        /// Names of the fields whose values changed since the snapshot.
        changed: BTreeSet<String>,
    },
    /// Delete a removed instance.
    Delete {
        /// The instance to delete.
        entity: Entity,
    },
}

impl PendingOp {
    /// Returns the instance this operation targets.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        match self {
            PendingOp::Insert { entity }
            | PendingOp::Update { entity, .. }
            | PendingOp::Delete { entity } => entity,
        }
    }

    /// Returns `true` for inserts.
    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(self, PendingOp::Insert { .. })
    }

    /// Instance tokens this operation must run after the insert of.
    ///
    /// Inserts depend on every current association target; updates only on
    /// the targets of changed fields; deletes on nothing.
    fn dependency_tokens(&self) -> Vec<usize> {
        let mut tokens = Vec::new();
        let (entity, filter): (&Entity, Option<&BTreeSet<String>>) = match self {
            PendingOp::Insert { entity } => (entity, None),
            PendingOp::Update { entity, changed } => (entity, Some(changed)),
            PendingOp::Delete { .. } => return tokens,
        };
        for (name, target) in entity.reference_targets() {
            if filter.is_none_or(|f| f.contains(&name)) {
                if let Some(t) = target {
                    tokens.push(t.ptr_token());
                }
            }
        }
        for (name, targets) in entity.list_targets() {
            if filter.is_none_or(|f| f.contains(&name)) {
                tokens.extend(targets.iter().map(Entity::ptr_token));
            }
        }
        tokens
    }

    /// Renders the operation into its store form.
    fn materialize(&self) -> CoreResult<StoreOp> {
        match self {
            PendingOp::Insert { entity } => Ok(StoreOp::Insert {
                type_name: entity.type_name().clone(),
                key: entity.key(),
                row: entity.to_row()?,
            }),
            PendingOp::Update { entity, changed } => Ok(StoreOp::Update {
                type_name: entity.type_name().clone(),
                key: entity
                    .key()
                    .ok_or_else(|| CoreError::missing_key(entity.type_name().clone()))?,
                changed: entity.row_of(changed)?,
            }),
            PendingOp::Delete { entity } => Ok(StoreOp::Delete {
                type_name: entity.type_name().clone(),
                key: entity
                    .key()
                    .ok_or_else(|| CoreError::missing_key(entity.type_name().clone()))?,
            }),
        }
    }
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = |entity: &Entity| match entity.identity() {
            Some(id) => id.to_string(),
            None => format!("{}#?", entity.type_name()),
        };
        match self {
            PendingOp::Insert { entity } => write!(f, "insert {}", target(entity)),
            PendingOp::Update { entity, changed } => {
                write!(f, "update {} [", target(entity))?;
                for (i, name) in changed.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                }
                f.write_str("]")
            }
            PendingOp::Delete { entity } => write!(f, "delete {}", target(entity)),
        }
    }
}

/// FIFO queue of pending writes, drained at flush.
#[derive(Debug, Default)]
pub struct WriteBehindQueue {
    ops: Vec<PendingOp>,
}

impl WriteBehindQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn enqueue(&mut self, op: PendingOp) {
        trace!(op = %op, "queued write");
        self.ops.push(op);
    }

    /// Returns the number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops all queued operations without executing them.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Executes all queued operations against the store and empties the
    /// queue. Returns the number of applied operations.
    ///
    /// Operations run in enqueue order, except that an operation whose
    /// entity references another entity inserted in the same batch runs
    /// after that insert. Store-generated keys are written back to their
    /// instances as soon as the insert returns, so later rows in the batch
    /// resolve them. Cyclic dependencies fall back to enqueue order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreOperation`] when the store rejects an
    /// operation; earlier operations of the batch stay applied and the
    /// remainder is dropped. Materialization can also fail with
    /// [`CoreError::MissingKey`].
    pub fn drain(&mut self, store: &mut dyn StoreExecutor) -> CoreResult<usize> {
        let ops = std::mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(0);
        }
        debug!(ops = ops.len(), "draining write-behind queue");

        let order = execution_order(&ops);
        let mut applied = 0;
        for (index, &slot) in order.iter().enumerate() {
            let pending = &ops[slot];
            let op = pending.materialize()?;
            trace!(op = %op, "applying store operation");
            let outcome = store.execute(&op).map_err(|source| {
                CoreError::StoreOperation {
                    index,
                    op: op.to_string(),
                    source,
                }
            })?;
            if let Some(key) = outcome.generated_key {
                pending.entity().assign_key(key);
            }
            applied += 1;
        }
        Ok(applied)
    }
}

/// Stable topological order over the batch.
///
/// Picks the earliest-enqueued operation whose in-batch insert dependencies
/// have all run. When no operation qualifies (a reference cycle), the
/// remainder keeps enqueue order.
fn execution_order(ops: &[PendingOp]) -> Vec<usize> {
    let insert_of: HashMap<usize, usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_insert())
        .map(|(i, op)| (op.entity().ptr_token(), i))
        .collect();

    let deps: Vec<Vec<usize>> = ops
        .iter()
        .enumerate()
        .map(|(i, op)| {
            op.dependency_tokens()
                .into_iter()
                .filter_map(|t| insert_of.get(&t).copied())
                .filter(|&j| j != i)
                .collect()
        })
        .collect();

    let mut order = Vec::with_capacity(ops.len());
    let mut emitted = vec![false; ops.len()];
    while order.len() < ops.len() {
        let next = (0..ops.len())
            .find(|&i| !emitted[i] && deps[i].iter().all(|&j| emitted[j]));
        match next {
            Some(i) => {
                emitted[i] = true;
                order.push(i);
            }
            None => {
                // cycle: keep enqueue order for whatever remains
                order.extend((0..ops.len()).filter(|&i| !emitted[i]));
                break;
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use orma_model::{EntityType, Key, TypeName, Value};
    use orma_store::{MemoryStore, StoreError};
    use std::sync::Arc;

    fn member_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::builder("Member")
                .scalar("username")
                .reference("team", "Team")
                .build(),
        )
    }

    fn team_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::builder("Team")
                .scalar("name")
                .reference("partner", "Team")
                .build(),
        )
    }

    #[test]
    fn drain_applies_in_enqueue_order() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();

        let a = Entity::new(member_type());
        a.set_key(1).unwrap();
        a.set("username", "A").unwrap();
        let b = Entity::new(member_type());
        b.set_key(2).unwrap();

        queue.enqueue(PendingOp::Insert { entity: a });
        queue.enqueue(PendingOp::Delete { entity: b.clone() });
        // the delete's row must exist first
        store
            .execute(&StoreOp::Insert {
                type_name: TypeName::new("Member"),
                key: Some(Key::Int(2)),
                row: orma_model::Row::new(),
            })
            .unwrap();
        store.clear_journal();

        let applied = queue.drain(&mut store).unwrap();
        assert_eq!(applied, 2);
        assert!(queue.is_empty());
        assert!(store.journal()[0].is_insert());
        assert!(matches!(store.journal()[1], StoreOp::Delete { .. }));
    }

    #[test]
    fn referencing_insert_runs_after_its_target() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();

        let team = Entity::new(team_type());
        let member = Entity::new(member_type());
        member.set_key(10).unwrap();
        member.set_reference("team", Some(&team)).unwrap();

        // enqueued out of dependency order on purpose
        queue.enqueue(PendingOp::Insert {
            entity: member.clone(),
        });
        queue.enqueue(PendingOp::Insert {
            entity: team.clone(),
        });

        queue.drain(&mut store).unwrap();

        let journal = store.journal();
        assert_eq!(journal[0].type_name(), &TypeName::new("Team"));
        assert_eq!(journal[1].type_name(), &TypeName::new("Member"));

        // the member row carries the key the store assigned to the team
        let generated = team.key().unwrap();
        let row = store.get(&TypeName::new("Member"), &Key::Int(10)).unwrap();
        assert_eq!(row.get("team"), Some(&Value::Key(generated)));
    }

    #[test]
    fn generated_key_is_written_back() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();

        let m = Entity::new(member_type());
        assert!(m.key().is_none());
        queue.enqueue(PendingOp::Insert { entity: m.clone() });

        queue.drain(&mut store).unwrap();
        assert_eq!(m.key(), Some(Key::Int(1)));
    }

    #[test]
    fn update_materializes_changed_fields_only() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();

        let m = Entity::new(member_type());
        m.set_key(150).unwrap();
        m.set("username", "A").unwrap();
        queue.enqueue(PendingOp::Insert { entity: m.clone() });
        queue.drain(&mut store).unwrap();
        store.clear_journal();

        m.set("username", "ZZZZ").unwrap();
        queue.enqueue(PendingOp::Update {
            entity: m,
            changed: BTreeSet::from(["username".to_owned()]),
        });
        queue.drain(&mut store).unwrap();

        match &store.journal()[0] {
            StoreOp::Update { changed, .. } => {
                let names: Vec<&str> = changed.field_names().collect();
                assert_eq!(names, vec!["username"]);
            }
            other => panic!("expected update, got {other}"),
        }
    }

    #[test]
    fn reference_cycle_falls_back_to_enqueue_order() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();

        let a = Entity::new(team_type());
        let b = Entity::new(team_type());
        a.set_key(1).unwrap();
        b.set_key(2).unwrap();
        a.set_reference("partner", Some(&b)).unwrap();
        b.set_reference("partner", Some(&a)).unwrap();

        queue.enqueue(PendingOp::Insert { entity: a });
        queue.enqueue(PendingOp::Insert { entity: b });
        queue.drain(&mut store).unwrap();

        assert_eq!(store.journal()[0].key(), Some(&Key::Int(1)));
        assert_eq!(store.journal()[1].key(), Some(&Key::Int(2)));
    }

    #[test]
    fn store_failure_names_the_operation() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();
        store.fail_next_op(StoreError::connection("refused"));

        let m = Entity::new(member_type());
        m.set_key(1).unwrap();
        queue.enqueue(PendingOp::Insert { entity: m });

        let err = queue.drain(&mut store).unwrap_err();
        match err {
            CoreError::StoreOperation { index, op, .. } => {
                assert_eq!(index, 0);
                assert_eq!(op, "insert Member#1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn delete_of_unkeyed_instance_fails() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();
        let m = Entity::new(member_type());
        queue.enqueue(PendingOp::Delete { entity: m });

        assert!(matches!(
            queue.drain(&mut store),
            Err(CoreError::MissingKey { .. })
        ));
    }

    #[test]
    fn clear_drops_everything() {
        let mut store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new();
        let m = Entity::new(member_type());
        queue.enqueue(PendingOp::Insert { entity: m });

        queue.clear();
        assert_eq!(queue.drain(&mut store).unwrap(), 0);
        assert!(store.journal().is_empty());
    }
}
