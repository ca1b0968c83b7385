//! Agent resource: the root of most reconcile closures (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::TlsTrust;
use crate::resource::{AcceptedStatus, Resource};
use crate::workflow::WorkflowPattern;

pub type Agent = Resource<AgentSpec, AcceptedStatus>;

/// One of {Declarative, Workflow, BYO}. Tagged by `type`, rejecting unknown
/// tags, per DESIGN NOTES' "dynamic discriminated unions".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentSpec {
    Declarative(DeclarativeAgentSpec),
    Workflow(WorkflowAgentSpec),
    #[serde(rename = "BYO")]
    Byo(ByoAgentSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeAgentSpec {
    pub instruction: String,

    /// Reference to a ModelConfig, `namespace/name` or bare `name`.
    pub model_config: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(default)]
    pub deployment: DeploymentHints,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsTrust>,

    #[serde(default)]
    pub stream: bool,
}

/// A tool reference is either a named tool on a named ToolServer/MCPServer,
/// or an inline HTTP/SSE MCP endpoint (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolRef {
    /// `server/tool` or bare `tool` resolved against the agent's default
    /// ToolServer, matching the teacher's "simple string, backward
    /// compatible" convention for loosely specified references.
    Named(String),

    Inline(InlineToolRef),
}

impl ToolRef {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolRef::Named(s) => s.split('/').next_back().unwrap_or(s),
            ToolRef::Inline(inline) => &inline.name,
        }
    }

    pub fn server_name(&self) -> Option<&str> {
        match self {
            ToolRef::Named(s) => s.split_once('/').map(|(server, _)| server),
            ToolRef::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineToolRef {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub sse: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAgentSpec {
    #[serde(flatten)]
    pub pattern: WorkflowPattern,

    #[serde(default)]
    pub stream: bool,
}

/// BYO ("bring your own") carries only a deployment descriptor; its
/// internals are opaque to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByoAgentSpec {
    pub image: String,
    #[serde(default, flatten)]
    pub deployment: HashMap<String, serde_json::Value>,
}
