//! Test fixtures and scope helpers.
//!
//! Provides convenience functions for setting up in-memory stores, scope
//! factories, and the entity shapes the test suites share.

use orma_core::{Config, ContextFactory, Entity};
use orma_model::{EntityType, FieldDef};
use orma_store::{MemoryStore, SequenceAllocator};
use parking_lot::Mutex;
use std::sync::{Arc, Once};

/// A scope factory over an inspectable in-memory store.
///
/// The store and allocator handles stay typed so tests can read the
/// journal, the tables, and the sequence positions directly.
pub struct TestContext {
    /// The in-memory store behind the factory.
    pub store: Arc<Mutex<MemoryStore>>,
    /// The sequence allocator behind the factory.
    pub allocator: Arc<Mutex<SequenceAllocator>>,
    /// The factory all scopes are opened from.
    pub factory: ContextFactory,
}

impl TestContext {
    /// Creates a context with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a context with an explicit configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let allocator = Arc::new(Mutex::new(SequenceAllocator::new()));
        let factory = ContextFactory::new(store.clone())
            .with_allocator(allocator.clone())
            .with_config(config);
        Self {
            store,
            allocator,
            factory,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Member: store-assigned key, a scalar, an embedded address, a to-one
/// association to Team, and a transient field.
#[must_use]
pub fn member_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::builder("Member")
            .store_assigned_key()
            .scalar("username")
            .scalar("age")
            .embedded("address")
            .reference("team", "Team")
            .transient("temp")
            .build(),
    )
}

/// Team: block-allocated key and a name.
#[must_use]
pub fn team_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::builder("Team")
            .allocated_key_with_block(10)
            .scalar("name")
            .build(),
    )
}

/// Item: caller-assigned key, a name, an element collection, and the
/// shared audit fields.
#[must_use]
pub fn item_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::builder("Item")
            .assigned_key()
            .scalar("name")
            .scalar("tags")
            .compose(&audit_fields())
            .build(),
    )
}

/// The audit fields shared by entity families in the fixtures.
#[must_use]
pub fn audit_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::scalar("created_by"),
        FieldDef::scalar("created_at"),
        FieldDef::scalar("modified_by"),
        FieldDef::scalar("modified_at"),
    ]
}

/// Creates a detached member with the username set.
#[must_use]
pub fn new_member(username: &str) -> Entity {
    let member = Entity::new(member_type());
    member
        .set("username", username)
        .expect("member_type declares username");
    member
}

/// Creates a detached team with the name set.
#[must_use]
pub fn new_team(name: &str) -> Entity {
    let team = Entity::new(team_type());
    team.set("name", name).expect("team_type declares name");
    team
}

/// Initializes tracing output for tests. Safe to call repeatedly.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
