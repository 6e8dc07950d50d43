//! # rigor-registry
//!
//! Test case declarations and the suite registry.
//!
//! ## Design Principles
//!
//! - Cases are declared once at startup; the registry is immutable afterward
//! - A case is identified by a unique name; group labels select subsets
//! - Predecessors, produced snapshots, and restored snapshots are explicit
//!   fields, not implicit wrapping
//! - The case body is an async capability taking an execution context and
//!   producing pass/fail; everything it talks to is an external collaborator
//!
//! ## Declaration
//!
//! ```
//! use rigor_registry::{Registry, TestCase};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     TestCase::builder("deploy_simple_flat")
//!         .group("smoke")
//!         .depends_on("prepare_slaves")
//!         .restores_snapshot("ready_with_3_slaves")
//!         .produces_snapshot("deploy_simple_flat")
//!         .build(),
//! ).unwrap();
//! ```

mod case;
mod error;
mod registry;

pub use case::{CaseBody, CaseContext, NoopBody, TestCase, TestCaseBuilder};
pub use error::{CaseError, RegistryError};
pub use registry::Registry;
