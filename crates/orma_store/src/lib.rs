//! # orma Store
//!
//! Store executor and key allocator boundary for orma.
//!
//! This crate defines the two external collaborators the unit-of-work engine
//! drains into, plus in-memory implementations for tests and ephemeral use:
//!
//! - [`StoreExecutor`] - applies insert/update/delete operations
//! - [`KeyAllocator`] - reserves contiguous key blocks (sequence-style)
//! - [`MemoryStore`] / [`SequenceAllocator`] - in-memory implementations
//!
//! ## Design Principles
//!
//! - Executors apply one operation at a time, in the order submitted
//! - A failed operation leaves previously applied operations in place;
//!   compensation is the transaction boundary's job, not the store's
//! - Store-assigned keys are returned synchronously in the
//!   [`ExecuteOutcome`] of the insert that produced them
//!
//! ## Example
//!
//! ```rust
//! use orma_model::{Row, TypeName, Value};
//! use orma_store::{MemoryStore, StoreExecutor, StoreOp};
//!
//! let mut store = MemoryStore::new();
//! let op = StoreOp::Insert {
//!     type_name: TypeName::new("Member"),
//!     key: None,
//!     row: Row::new().with("username", Value::text("A")),
//! };
//! let outcome = store.execute(&op).unwrap();
//! assert!(outcome.generated_key.is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod error;
mod executor;
mod memory;
mod ops;

pub use allocator::{KeyAllocator, SequenceAllocator};
pub use error::{StoreError, StoreResult};
pub use executor::{ExecuteOutcome, StoreExecutor};
pub use memory::MemoryStore;
pub use ops::StoreOp;
