//! Scope factory.
//!
//! A [`ContextFactory`] owns what outlives any single scope: the store
//! executor, the key allocator, the cache of pre-allocated key blocks, and
//! the configuration. Scopes opened by the same factory share all of them,
//! so a key block reserved by one scope keeps serving the next.

use crate::config::Config;
use crate::error::CoreResult;
use crate::uow::UnitOfWork;
use orma_model::TypeName;
use orma_store::{KeyAllocator, SequenceAllocator, StoreExecutor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Shared handle to the store executor.
pub type SharedStore = Arc<Mutex<dyn StoreExecutor>>;

/// Shared handle to the key allocator.
pub type SharedAllocator = Arc<Mutex<dyn KeyAllocator>>;

/// One reserved block of pre-allocated keys.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyBlock {
    pub(crate) next: i64,
    pub(crate) remaining: u32,
}

pub(crate) type BlockCache = Arc<Mutex<HashMap<TypeName, KeyBlock>>>;

/// Opens unit-of-work scopes over a shared store.
#[derive(Clone)]
pub struct ContextFactory {
    store: SharedStore,
    allocator: SharedAllocator,
    blocks: BlockCache,
    config: Config,
}

impl ContextFactory {
    /// Creates a factory over a store, with a [`SequenceAllocator`] and
    /// default configuration.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            allocator: Arc::new(Mutex::new(SequenceAllocator::new())),
            blocks: Arc::new(Mutex::new(HashMap::new())),
            config: Config::default(),
        }
    }

    /// Replaces the key allocator.
    #[must_use]
    pub fn with_allocator(mut self, allocator: SharedAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration scopes are opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a new scope.
    #[must_use]
    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork::new(
            Arc::clone(&self.store),
            Arc::clone(&self.allocator),
            Arc::clone(&self.blocks),
            self.config.clone(),
        )
    }

    /// Runs `f` inside a scope: commits when it returns `Ok`, rolls back
    /// when it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or the commit's.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut UnitOfWork) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut uow = self.begin();
        match f(&mut uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = uow.rollback();
                Err(err)
            }
        }
    }
}

impl fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use orma_model::{EntityType, TypeName};
    use orma_store::MemoryStore;

    fn setup() -> (Arc<Mutex<MemoryStore>>, ContextFactory) {
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let factory = ContextFactory::new(store.clone());
        (store, factory)
    }

    fn member_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::builder("Member")
                .store_assigned_key()
                .scalar("username")
                .build(),
        )
    }

    #[test]
    fn scopes_have_distinct_ids() {
        let (_, factory) = setup();
        let a = factory.begin();
        let b = factory.begin();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn transaction_commits_on_ok() {
        let (store, factory) = setup();
        let ty = member_type();

        factory
            .transaction(|uow| {
                let m = crate::Entity::new(ty.clone());
                m.set("username", "A")?;
                uow.attach_new(&m)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.lock().row_count(&TypeName::new("Member")), 1);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let (store, factory) = setup();
        let ty = member_type();

        let result: CoreResult<()> = factory.transaction(|uow| {
            let m = crate::Entity::new(ty.clone());
            uow.attach_new(&m)?;
            Err(CoreError::not_managed(TypeName::new("Member")))
        });

        assert!(result.is_err());
        assert!(store.lock().journal().is_empty());
    }
}
