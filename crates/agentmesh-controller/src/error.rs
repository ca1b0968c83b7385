//! Controller error taxonomy (§7): validation errors (reported via status),
//! transient errors (retried), and the scheduler's own plumbing errors.

use agentmesh_core::ResourceRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("reference {reference} does not resolve to an existing resource")]
    MissingReference { reference: ResourceRef },

    #[error("workflow {reference} has {detail}")]
    WorkflowCardinality { reference: ResourceRef, detail: String },

    #[error("workflow cycle: {path}")]
    WorkflowCycle { path: String },

    #[error("duplicate workflow pattern discriminator on {reference}: {present:?}")]
    DuplicateDiscriminator {
        reference: ResourceRef,
        present: Vec<&'static str>,
    },

    #[error("transient failure reconciling {reference}: {source}")]
    Transient {
        reference: ResourceRef,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Core(#[from] agentmesh_core::AgentMeshError),
}

impl ControllerError {
    /// The stable, machine-readable reason string the Status Reporter
    /// writes into the Accepted condition (§4.5, §7: "machine-readable
    /// reasons are enum-like").
    pub fn reason(&self) -> &'static str {
        match self {
            ControllerError::MissingReference { .. } => "ReconcileFailed",
            ControllerError::WorkflowCardinality { .. } => "WorkflowCardinality",
            ControllerError::WorkflowCycle { .. } => "WorkflowCycle",
            ControllerError::DuplicateDiscriminator { .. } => "WorkflowCardinality",
            ControllerError::Transient { .. } => "ReconcileFailed",
            ControllerError::Core(_) => "ReconcileFailed",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ControllerError::Transient { .. })
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
