//! Memory resource: a store descriptor plus embedding/TTL/popularity policy
//! (§3, §4.10). This is the declarative spec type; the runtime trait and
//! concrete backends live in the `agentmesh-memory` crate.

use serde::{Deserialize, Serialize};

use crate::resource::{AcceptedStatus, Resource};

pub type Memory = Resource<MemorySpec, AcceptedStatus>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySpec {
    pub backend: MemoryBackendKind,

    /// Reference to the ModelConfig used to compute embeddings; required
    /// when `backend` is `VectorService`, ignored for `InProcess`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,

    #[serde(default)]
    pub popularity_extension: PopularityExtensionPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    /// Connection descriptor for an external vector service; opaque beyond
    /// what's needed to route to it (spec treats persistent stores as
    /// external collaborators).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemoryBackendKind {
    InProcess,
    VectorService,
}

/// Pushes an entry's expiry out by one additional TTL window once its
/// access count crosses `access_count_threshold`, capped at one extension
/// per entry (§4.10).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularityExtensionPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_access_count_threshold")]
    pub access_count_threshold: u32,
}

impl Default for PopularityExtensionPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            access_count_threshold: default_access_count_threshold(),
        }
    }
}

fn default_access_count_threshold() -> u32 {
    10
}
