//! Snapshot-based dirty checking.

use crate::entity::Entity;
use crate::queue::PendingOp;
use crate::snapshot::SnapshotStore;
use crate::types::EntityStatus;
use tracing::trace;

/// One instance tracked by a scope, with its lifecycle status.
#[derive(Debug, Clone)]
pub(crate) struct TrackedEntity {
    pub(crate) entity: Entity,
    pub(crate) status: EntityStatus,
}

impl TrackedEntity {
    pub(crate) fn new(entity: Entity, status: EntityStatus) -> Self {
        Self { entity, status }
    }
}

/// Derives pending operations from tracked instances.
///
/// The scan is the only source of updates: nothing records mutations as
/// they happen, the flush compares every managed instance against the
/// snapshot taken when it became managed.
pub(crate) struct DirtyChecker;

impl DirtyChecker {
    /// Scans tracked instances in tracking order and returns the writes the
    /// store must see.
    ///
    /// New instances produce inserts, managed instances with a non-empty
    /// diff produce field-precise updates, removed instances produce
    /// deletes. Clean managed instances produce nothing.
    pub(crate) fn scan(tracked: &[TrackedEntity], snapshots: &SnapshotStore) -> Vec<PendingOp> {
        let mut ops = Vec::new();
        for t in tracked {
            match t.status {
                EntityStatus::New => ops.push(PendingOp::Insert {
                    entity: t.entity.clone(),
                }),
                EntityStatus::Managed => {
                    let changed = snapshots.diff(&t.entity);
                    if !changed.is_empty() {
                        trace!(
                            entity = ?t.entity,
                            fields = changed.len(),
                            "dirty instance detected"
                        );
                        ops.push(PendingOp::Update {
                            entity: t.entity.clone(),
                            changed,
                        });
                    }
                }
                EntityStatus::Removed => ops.push(PendingOp::Delete {
                    entity: t.entity.clone(),
                }),
            }
        }
        ops
    }
}
