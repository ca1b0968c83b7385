//! Shared error taxonomy for the agentmesh workspace.
//!
//! Each crate in the workspace carries its own `thiserror` enum for its own
//! concerns; this one covers the shapes that are common to every layer:
//! resource parsing, reference resolution, and validation.

use thiserror::Error;

use crate::resource::ResourceRef;

/// Errors produced while loading, resolving, or validating declarative
/// resources.
#[derive(Debug, Error)]
pub enum AgentMeshError {
    #[error("failed to read resource file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse resource {path}: {source}")]
    Deserialize {
        path: String,
        #[source]
        source: serde_path_to_error::Error<serde_yaml::Error>,
    },

    #[error("reference {0} does not resolve to an existing resource")]
    MissingReference(ResourceRef),

    #[error("workflow {0} has {1}; exactly one of Sequential, Parallel, or Loop must be set")]
    WorkflowCardinality(ResourceRef, &'static str),

    #[error("workflow cycle detected: {0}")]
    WorkflowCycle(String),

    #[error("duplicate resource {0}")]
    Duplicate(ResourceRef),

    #[error("invalid identifier {0:?}: {1}")]
    InvalidIdentifier(String, &'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AgentMeshResult<T> = Result<T, AgentMeshError>;
