//! # orma Testkit
//!
//! Test utilities for orma.
//!
//! This crate provides:
//! - Ready-made entity-type descriptors and factory/store fixtures
//! - Property-based test generators using proptest
//! - Tracing initialization for test output
//!
//! ## Usage
//!
//! ```rust
//! use orma_testkit::prelude::*;
//!
//! let ctx = TestContext::new();
//! let mut uow = ctx.factory.begin();
//! let member = new_member("A");
//! uow.attach_new(&member).unwrap();
//! uow.commit().unwrap();
//! assert_eq!(ctx.store.lock().journal().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
