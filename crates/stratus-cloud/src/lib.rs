//! Stratus cloud collaborators
//!
//! This crate holds everything the provisioning engine treats as external:
//! the provider abstraction actually creating/reading/deleting resources,
//! the secret store, the persisted last-known-applied state, and the
//! plan/report types shared with the CLI.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Stratus CLI                    │
//! │              (stratus plan/apply)               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stratus-engine                    │
//! │   graph build → level execution → reconcile     │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ stratus-cloud │ │ stratus-cloud │
//! │   Provider    │ │  StateManager │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod memory;
pub mod provider;
pub mod secret;
pub mod state;

// Re-exports
pub use action::{
    ActionKind, ApplyReport, NodeOutcome, NodeState, Plan, PlanSummary, PlannedAction,
    ReportSummary,
};
pub use error::{CloudError, Result};
pub use memory::MemoryProvider;
pub use provider::{Outputs, Provider};
pub use secret::{EnvSecretStore, SecretStore, StaticSecretStore};
pub use state::{GlobalState, ResourceRecord, StateLock, StateManager};
