//! The generated AgentConfig document (§4.3, §6): the Translator's sole
//! output artifact for a Declarative agent, and the document the runtime
//! loads to start serving.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The canonical, runtime-consumable configuration document. Produced only
/// by the Translator; never hand-edited. Identical closures must produce a
/// byte-identical `AgentConfig` (§3 invariant 4), so field order here
/// matters for anything that gets serialized for a determinism check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub name: String,

    /// Absent for Workflow/BYO agents, which route rather than call a
    /// model directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_tools: Vec<HttpToolSection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sse_tools: Vec<SseToolSection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_agents: Vec<RemoteAgentSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemorySection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowSection>,

    pub stream: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_config: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumability_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    #[serde(rename = "type")]
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_material: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpToolSection {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_allowlist: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_allowlist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseToolSection {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_allowlist: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_allowlist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAgentSection {
    pub name: String,
    /// `http://<name>.<namespace>:<agent-port>` (§4.3).
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySection {
    /// `provider`, with backward-compat fallback to `type` on read (§6).
    #[serde(alias = "type")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSection {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "pattern")]
pub enum WorkflowSection {
    Sequential { sub_agents: Vec<String> },
    Parallel { sub_agents: Vec<String>, max_workers: u32 },
    Loop { sub_agents: Vec<String>, max_iterations: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_agent_configs_serialize_byte_identically() {
        let make = || AgentConfig {
            name: "billing-bot".into(),
            model: Some(ModelSection {
                provider: "openai".into(),
                model: "gpt-4".into(),
                base_url: None,
                tls_material: None,
                headers: HashMap::new(),
                temperature: Some(0.2),
                max_tokens: None,
            }),
            http_tools: vec![],
            sse_tools: vec![],
            remote_agents: vec![],
            memory: None,
            workflow: None,
            stream: true,
            context_config: None,
            resumability_config: None,
        };
        let a = serde_json::to_string(&make()).unwrap();
        let b = serde_json::to_string(&make()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn memory_section_reads_legacy_type_field_as_provider() {
        let legacy = serde_json::json!({"type": "in-process"});
        let section: MemorySection = serde_json::from_value(legacy).unwrap();
        assert_eq!(section.provider, "in-process");
    }
}
