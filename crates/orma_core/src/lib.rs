//! Unit-of-work persistence engine.
//!
//! `orma_core` tracks entity instances across a transactional conversation
//! and synchronizes them with a store in batches. A [`ContextFactory`]
//! opens [`UnitOfWork`] scopes over a shared [`orma_store::StoreExecutor`];
//! within a scope, an identity map guarantees one live instance per key,
//! snapshots make mutations observable without write interception, and a
//! write-behind queue turns the accumulated differences into
//! dependency-ordered store operations at flush time.
//!
//! # Example
//!
//! ```rust
//! use orma_core::{ContextFactory, Entity};
//! use orma_model::EntityType;
//! use orma_store::MemoryStore;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! # fn main() -> orma_core::CoreResult<()> {
//! let store = Arc::new(Mutex::new(MemoryStore::new()));
//! let factory = ContextFactory::new(store);
//!
//! let member_type = Arc::new(
//!     EntityType::builder("Member")
//!         .store_assigned_key()
//!         .scalar("username")
//!         .build(),
//! );
//!
//! let mut uow = factory.begin();
//! let member = Entity::new(member_type);
//! member.set("username", "A")?;
//! uow.attach_new(&member)?;
//! uow.commit()?;
//!
//! // the store assigned the key during the flush
//! assert!(member.key().is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dirty;
mod entity;
mod error;
mod factory;
mod queue;
mod registry;
mod snapshot;
mod types;
mod uow;

pub use config::Config;
pub use entity::Entity;
pub use error::{CoreError, CoreResult};
pub use factory::{ContextFactory, SharedAllocator, SharedStore};
pub use queue::{PendingOp, WriteBehindQueue};
pub use registry::IdentityRegistry;
pub use snapshot::{Snapshot, SnapshotStore};
pub use types::{EntityStatus, ScopeId};
pub use uow::{ScopeState, UnitOfWork};
