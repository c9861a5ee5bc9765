//! Engine error taxonomy
//!
//! Cycle, conflict and reference errors are validation-phase failures:
//! detected before any node is applied, aborting the run with zero side
//! effects. Resolution and apply errors surface per node and block only the
//! branch depending on them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to resolve fact '{key}': {message}")]
    Resolution { key: String, message: String },

    #[error("dependency cycle detected among: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("reference to unknown node '{node}' (output '{output}')")]
    Reference { node: String, output: String },

    #[error("node '{node_id}' failed to apply: {message}")]
    Apply { node_id: String, message: String },

    #[error("template error: {0}")]
    Template(String),

    #[error(transparent)]
    Core(#[from] stratus_core::CoreError),

    #[error(transparent)]
    Cloud(#[from] stratus_cloud::CloudError),
}

impl EngineError {
    /// Whether the error must abort the run before anything is applied.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Cycle { .. } | EngineError::Conflict(_) | EngineError::Reference { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
