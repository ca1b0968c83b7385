//! The shared envelope every declarative resource is wrapped in, and the
//! reference type used throughout the Dependency Index and Translator.

use std::fmt;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of a declarative resource, as it appears in the `kind` field and
/// throughout the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Agent,
    ModelConfig,
    ToolServer,
    Memory,
    Team,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Agent => "Agent",
            ResourceKind::ModelConfig => "ModelConfig",
            ResourceKind::ToolServer => "ToolServer",
            ResourceKind::Memory => "Memory",
            ResourceKind::Team => "Team",
        };
        f.write_str(s)
    }
}

/// A reference to a resource by (kind, namespace, name). This is the key
/// type for the Dependency Index's `deps`/`rdeps` maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `namespace/name` or bare `name` reference, defaulting the
    /// namespace to `default_ns` when unqualified (§3: "references default
    /// the namespace to the referrer's").
    pub fn parse(kind: ResourceKind, reference: &str, default_ns: &str) -> Self {
        match reference.split_once('/') {
            Some((ns, name)) => Self::new(kind, ns, name),
            None => Self::new(kind, default_ns, reference),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

fn default_api_version() -> String {
    "agentmesh.dev/v1alpha1".to_string()
}

/// Common metadata carried by every resource envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default)]
    pub namespace: Option<String>,

    /// Bumped by the external actor on every spec change; the Status
    /// Reporter mirrors this into `status.observedGeneration` once a
    /// reconcile against that generation completes.
    #[serde(default = "default_generation")]
    pub generation: i64,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

fn default_generation() -> i64 {
    1
}

impl ObjectMeta {
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or("default")
    }
}

/// A generic resource envelope: `apiVersion`/`kind`/`metadata`/`spec`/`status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<Spec, Status = AcceptedStatus> {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ObjectMeta,

    pub spec: Spec,

    #[serde(default)]
    pub status: Status,
}

impl<Spec, Status: Default> Resource<Spec, Status> {
    pub fn resource_ref(&self, kind: ResourceKind) -> ResourceRef {
        ResourceRef::new(kind, self.metadata.namespace_or_default(), &self.metadata.name)
    }
}

/// A single `Accepted` condition, written exclusively by the Status
/// Reporter (§4.5). `reason` is machine-readable (enum-like, stable);
/// `message` is a human-readable sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// The standard `status` block: one Accepted condition plus the generation
/// it was computed against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

impl AcceptedStatus {
    pub fn accepted(&self) -> bool {
        self.conditions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|c| c.condition_type == "Accepted" && c.status == ConditionStatus::True)
    }
}
