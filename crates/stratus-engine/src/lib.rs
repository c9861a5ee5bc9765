//! Stratus provisioning engine
//!
//! Compiles a declared specification into a dependency graph and applies it
//! against a provider, idempotently and with isolated failure handling.
//!
//! Pipeline, leaf to root:
//!
//! 1. [`facts`] — memoized resolution of externally-sourced values
//! 2. [`topology`] — deterministic per-zone address block allocation and
//!    expansion of per-zone resource groups
//! 3. [`graph`] — reference extraction, cycle/conflict validation,
//!    topological leveling
//! 4. [`executor`] — level-by-level application with bounded parallelism,
//!    driving reconciliation and template rendering per node
//! 5. [`reconcile`] — desired-versus-applied diffing into minimal actions
//! 6. [`template`] — late-bound payload rendering from applied outputs
//!
//! Validation failures (cycles, conflicts, dangling references) abort before
//! any side effect. Apply failures are isolated to their node: dependents
//! are blocked, independent branches continue.

pub mod error;
pub mod executor;
pub mod facts;
pub mod graph;
pub mod reconcile;
pub mod template;
pub mod topology;

pub use error::{EngineError, Result};
pub use executor::{Executor, ExecutorOptions};
pub use facts::FactResolver;
pub use graph::{Edge, Graph, Node};
pub use topology::ZoneAllocation;
