//! Unit-of-work scopes.
//!
//! A [`UnitOfWork`] tracks entity instances across one transactional
//! conversation: it keeps the identity map, captures snapshots when
//! instances become managed, and turns the accumulated differences into a
//! dependency-ordered batch of store writes at flush time. Nothing reaches
//! the store between flushes.

use crate::config::Config;
use crate::dirty::{DirtyChecker, TrackedEntity};
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::factory::{BlockCache, KeyBlock, SharedAllocator, SharedStore};
use crate::queue::WriteBehindQueue;
use crate::registry::IdentityRegistry;
use crate::snapshot::SnapshotStore;
use crate::types::{EntityStatus, ScopeId};
use orma_model::{IdentityKey, Key, KeyGen, TypeName};
use std::fmt;
use tracing::{debug, trace, warn};

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Accepting attachments, mutations, and flushes.
    Active,
    /// A flush is in progress.
    Flushing,
    /// A flush failed; only rollback is accepted.
    Failed,
    /// Terminal: the scope committed.
    Committed,
    /// Terminal: the scope rolled back.
    RolledBack,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeState::Active => f.write_str("active"),
            ScopeState::Flushing => f.write_str("flushing"),
            ScopeState::Failed => f.write_str("failed"),
            ScopeState::Committed => f.write_str("committed"),
            ScopeState::RolledBack => f.write_str("rolled-back"),
        }
    }
}

/// One unit-of-work scope.
///
/// Opened by [`crate::ContextFactory::begin`]. Instances attached to a
/// scope are exclusively owned by it until the scope commits, rolls back,
/// or clears; attaching them to a second live scope fails.
pub struct UnitOfWork {
    id: ScopeId,
    state: ScopeState,
    config: Config,
    store: SharedStore,
    allocator: SharedAllocator,
    blocks: BlockCache,
    registry: IdentityRegistry,
    snapshots: SnapshotStore,
    queue: WriteBehindQueue,
    tracked: Vec<TrackedEntity>,
}

impl UnitOfWork {
    pub(crate) fn new(
        store: SharedStore,
        allocator: SharedAllocator,
        blocks: BlockCache,
        config: Config,
    ) -> Self {
        let id = ScopeId::next();
        debug!(scope = %id, "scope opened");
        Self {
            id,
            state: ScopeState::Active,
            config,
            store,
            allocator,
            blocks,
            registry: IdentityRegistry::new(),
            snapshots: SnapshotStore::new(),
            queue: WriteBehindQueue::new(),
            tracked: Vec::new(),
        }
    }

    /// Returns the scope ID.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Returns the scope configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.state == ScopeState::Active {
            Ok(())
        } else {
            Err(CoreError::ScopeTerminated { state: self.state })
        }
    }

    /// Attaches a new (never persisted) instance. The next flush inserts it.
    ///
    /// An instance the scope already tracks is accepted again as a no-op;
    /// re-attaching one that was marked removed cancels the removal. A keyed
    /// instance is bound in the identity map immediately; an unkeyed one is
    /// bound once its key is known.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CrossScopeAttach`] if another live scope owns
    /// the instance, [`CoreError::DuplicateIdentity`] if its key is already
    /// bound to a different instance here, and
    /// [`CoreError::ScopeTerminated`] on a non-active scope.
    pub fn attach_new(&mut self, entity: &Entity) -> CoreResult<()> {
        self.ensure_active()?;
        match entity.claim(self.id) {
            Ok(true) => {
                if let Some(identity) = entity.identity() {
                    if let Err(err) = self.registry.register(identity, entity) {
                        entity.release(self.id);
                        return Err(err);
                    }
                }
                trace!(scope = %self.id, entity = ?entity, "attached new instance");
                self.tracked
                    .push(TrackedEntity::new(entity.clone(), EntityStatus::New));
                Ok(())
            }
            Ok(false) => {
                // already ours; a pending removal is cancelled
                if let Some(t) = self
                    .tracked
                    .iter_mut()
                    .find(|t| Entity::same_instance(&t.entity, entity))
                {
                    if t.status == EntityStatus::Removed {
                        t.status = if self.snapshots.get(entity).is_some() {
                            EntityStatus::Managed
                        } else {
                            EntityStatus::New
                        };
                    }
                }
                Ok(())
            }
            Err(owner) => Err(CoreError::CrossScopeAttach {
                type_name: entity.type_name().clone(),
                owner,
            }),
        }
    }

    /// Attaches an instance that already exists in the store, returning the
    /// managed instance to use from here on.
    ///
    /// When the identity is already bound in this scope, the bound instance
    /// is returned and the argument stays detached; callers must continue
    /// with the returned handle. Otherwise the argument becomes managed and
    /// its snapshot is taken.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingKey`] for an unkeyed instance,
    /// [`CoreError::CrossScopeAttach`] if another live scope owns it, and
    /// [`CoreError::ScopeTerminated`] on a non-active scope.
    pub fn attach_managed(&mut self, entity: &Entity) -> CoreResult<Entity> {
        self.ensure_active()?;
        let identity = entity
            .identity()
            .ok_or_else(|| CoreError::missing_key(entity.type_name().clone()))?;

        if let Some(existing) = self.registry.lookup(&identity) {
            // identity map wins over the incoming instance
            return Ok(existing);
        }

        if let Err(owner) = entity.claim(self.id) {
            return Err(CoreError::CrossScopeAttach {
                type_name: entity.type_name().clone(),
                owner,
            });
        }
        self.registry.register(identity, entity)?;
        self.snapshots.capture(entity);
        if !self
            .tracked
            .iter()
            .any(|t| Entity::same_instance(&t.entity, entity))
        {
            self.tracked
                .push(TrackedEntity::new(entity.clone(), EntityStatus::Managed));
        }
        trace!(scope = %self.id, entity = ?entity, "attached managed instance");
        Ok(entity.clone())
    }

    /// Schedules a managed instance for deletion at the next flush.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotManaged`] unless the instance is currently
    /// managed by this scope, and [`CoreError::ScopeTerminated`] on a
    /// non-active scope.
    pub fn mark_removed(&mut self, entity: &Entity) -> CoreResult<()> {
        self.ensure_active()?;
        let tracked = self
            .tracked
            .iter_mut()
            .find(|t| Entity::same_instance(&t.entity, entity))
            .filter(|t| t.status == EntityStatus::Managed)
            .ok_or_else(|| CoreError::not_managed(entity.type_name().clone()))?;
        tracked.status = EntityStatus::Removed;
        trace!(scope = %self.id, entity = ?entity, "scheduled removal");
        Ok(())
    }

    /// Looks up the managed instance bound to an identity.
    ///
    /// Only the identity map is consulted; this never reads the store.
    #[must_use]
    pub fn find(&self, type_name: impl Into<TypeName>, key: impl Into<Key>) -> Option<Entity> {
        self.registry
            .lookup(&IdentityKey::new(type_name.into(), key.into()))
    }

    /// Returns `true` if this scope tracks the instance and it is not
    /// scheduled for removal.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.tracked
            .iter()
            .any(|t| t.status != EntityStatus::Removed && Entity::same_instance(&t.entity, entity))
    }

    /// Returns `true` if the instance would produce a write at the next
    /// flush.
    #[must_use]
    pub fn is_dirty(&self, entity: &Entity) -> bool {
        self.tracked
            .iter()
            .find(|t| Entity::same_instance(&t.entity, entity))
            .is_some_and(|t| match t.status {
                EntityStatus::New | EntityStatus::Removed => true,
                EntityStatus::Managed => !self.snapshots.diff(&t.entity).is_empty(),
            })
    }

    /// Returns `true` if pending changes could affect a query over the
    /// given entity types (`None` means any type).
    ///
    /// Query executors combine this with
    /// [`Config::auto_flush_on_query`] to decide whether to flush before
    /// running.
    #[must_use]
    pub fn pending_changes_affect(&self, types: Option<&[TypeName]>) -> bool {
        self.tracked
            .iter()
            .filter(|t| types.is_none_or(|ts| ts.contains(t.entity.type_name())))
            .any(|t| match t.status {
                EntityStatus::New | EntityStatus::Removed => true,
                EntityStatus::Managed => !self.snapshots.diff(&t.entity).is_empty(),
            })
    }

    /// Returns the tracked instances of `source_type` whose `field`
    /// association currently points at `target`.
    ///
    /// This is how the non-owning side of an association is read: the
    /// inverse is recomputed from tracked state instead of being stored on
    /// the target.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] or
    /// [`CoreError::FieldKindMismatch`] when `field` is not a to-one
    /// association of `source_type`.
    pub fn referencing(
        &self,
        target: &Entity,
        source_type: &TypeName,
        field: &str,
    ) -> CoreResult<Vec<Entity>> {
        let mut sources = Vec::new();
        for t in &self.tracked {
            if t.status == EntityStatus::Removed || t.entity.type_name() != source_type {
                continue;
            }
            if let Some(current) = t.entity.reference(field)? {
                let hit = Entity::same_instance(&current, target)
                    || (current.identity().is_some() && current.identity() == target.identity());
                if hit {
                    sources.push(t.entity.clone());
                }
            }
        }
        Ok(sources)
    }

    /// Synchronizes tracked state with the store and returns the number of
    /// applied operations.
    ///
    /// New instances are inserted (pre-allocating keys where their type
    /// requires it), dirty managed instances are updated field-precisely,
    /// removed instances are deleted. Instances that survive become (or
    /// stay) managed with fresh snapshots, so an immediately following
    /// flush applies nothing.
    ///
    /// # Errors
    ///
    /// On any error the scope moves to [`ScopeState::Failed`]: the store
    /// may hold a partially applied batch and only [`UnitOfWork::rollback`]
    /// is accepted afterwards.
    pub fn flush(&mut self) -> CoreResult<usize> {
        self.ensure_active()?;
        self.state = ScopeState::Flushing;
        match self.flush_inner() {
            Ok(applied) => {
                self.state = ScopeState::Active;
                Ok(applied)
            }
            Err(err) => {
                self.state = ScopeState::Failed;
                warn!(scope = %self.id, error = %err, "flush failed; rollback required");
                Err(err)
            }
        }
    }

    fn flush_inner(&mut self) -> CoreResult<usize> {
        self.assign_pending_keys()?;

        let ops = DirtyChecker::scan(&self.tracked, &self.snapshots);
        if ops.is_empty() {
            trace!(scope = %self.id, "nothing to flush");
            return Ok(0);
        }
        for op in ops {
            self.queue.enqueue(op);
        }
        let applied = self.queue.drain(&mut *self.store.lock())?;

        for t in self.tracked.iter_mut() {
            match t.status {
                EntityStatus::New => {
                    let identity = t
                        .entity
                        .identity()
                        .ok_or_else(|| CoreError::missing_key(t.entity.type_name().clone()))?;
                    self.registry.register(identity, &t.entity)?;
                    self.snapshots.capture(&t.entity);
                    t.status = EntityStatus::Managed;
                }
                EntityStatus::Managed => {
                    if self.config.recapture_clean_snapshots
                        || !self.snapshots.diff(&t.entity).is_empty()
                    {
                        self.snapshots.capture(&t.entity);
                    }
                }
                EntityStatus::Removed => {}
            }
        }

        let scope = self.id;
        let registry = &mut self.registry;
        let snapshots = &mut self.snapshots;
        self.tracked.retain(|t| {
            if t.status != EntityStatus::Removed {
                return true;
            }
            if let Some(identity) = t.entity.identity() {
                registry.remove(&identity);
            }
            snapshots.remove(&t.entity);
            t.entity.release(scope);
            false
        });

        debug!(scope = %self.id, applied, "flush applied pending writes");
        Ok(applied)
    }

    /// Pre-assigns keys to new instances whose type allocates them in
    /// blocks, and rejects caller-assigned types that were attached without
    /// a key. Store-assigned types stay unkeyed until their insert runs.
    fn assign_pending_keys(&self) -> CoreResult<()> {
        for t in &self.tracked {
            if t.status != EntityStatus::New || t.entity.key().is_some() {
                continue;
            }
            match t.entity.entity_type().key_gen() {
                KeyGen::Assigned => {
                    return Err(CoreError::missing_key(t.entity.type_name().clone()));
                }
                KeyGen::Allocated { block_size } => {
                    let key = self.next_allocated(t.entity.type_name(), block_size)?;
                    t.entity.assign_key(Key::Int(key));
                }
                KeyGen::StoreAssigned => {}
            }
        }
        Ok(())
    }

    fn next_allocated(&self, type_name: &TypeName, block_size: u32) -> CoreResult<i64> {
        let mut blocks = self.blocks.lock();
        let block = blocks.entry(type_name.clone()).or_insert(KeyBlock {
            next: 0,
            remaining: 0,
        });
        if block.remaining == 0 {
            let start = self
                .allocator
                .lock()
                .allocate_block(type_name, block_size)
                .map_err(CoreError::Allocator)?;
            block.next = start;
            block.remaining = block_size.max(1);
            debug!(%type_name, start, block_size, "reserved key block");
        }
        let key = block.next;
        block.next += 1;
        block.remaining -= 1;
        Ok(key)
    }

    /// Flushes and terminates the scope.
    ///
    /// A failed flush rolls the scope back (released instances, terminal
    /// state) and returns the flush error; the store keeps whatever part of
    /// the batch it applied before the failure.
    ///
    /// # Errors
    ///
    /// The flush's error, or [`CoreError::ScopeTerminated`] on a non-active
    /// scope.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        match self.flush() {
            Ok(_) => {
                self.release_all();
                self.state = ScopeState::Committed;
                debug!(scope = %self.id, "scope committed");
                Ok(())
            }
            Err(err) => {
                self.release_all();
                self.state = ScopeState::RolledBack;
                Err(err)
            }
        }
    }

    /// Discards all pending state and terminates the scope.
    ///
    /// Accepted while the scope is active or failed. Already-flushed writes
    /// are not undone; external transaction demarcation is the caller's
    /// concern.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ScopeTerminated`] if the scope already
    /// terminated.
    pub fn rollback(&mut self) -> CoreResult<()> {
        match self.state {
            ScopeState::Active | ScopeState::Flushing | ScopeState::Failed => {
                self.release_all();
                self.state = ScopeState::RolledBack;
                debug!(scope = %self.id, "scope rolled back");
                Ok(())
            }
            state => Err(CoreError::ScopeTerminated { state }),
        }
    }

    /// Detaches every tracked instance without writing anything. The scope
    /// stays active.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ScopeTerminated`] on a non-active scope.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.release_all();
        Ok(())
    }

    fn release_all(&mut self) {
        for t in &self.tracked {
            t.entity.release(self.id);
        }
        self.tracked.clear();
        self.registry.clear();
        self.snapshots.clear();
        self.queue.clear();
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        // a scope dropped without commit/rollback must not keep its
        // instances claimed forever
        if !matches!(self.state, ScopeState::Committed | ScopeState::RolledBack) {
            for t in &self.tracked {
                t.entity.release(self.id);
            }
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &format_args!("{}", self.id))
            .field("state", &self.state)
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}
