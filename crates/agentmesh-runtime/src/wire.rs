//! Wire shapes for the inbound/outbound agent protocol (§6). These are the
//! types the Protocol Adapter converts to and from; nothing in the Event
//! Pipeline touches them directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: WireMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Caller's streaming preference. Absent means "use the agent's
    /// configured default" (§6).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

/// On-the-wire representation of a message part. `data` parts carry their
/// discriminator in `metadata.kagent.a2a_data_part_type` rather than a
/// top-level tag, matching §6's part shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Part {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
    File {
        file: FilePayload,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
    Data {
        data: Value,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePayload {
    Uri { uri: String },
    Inline { bytes: String, mime_type: Option<String> },
}

pub type Metadata = HashMap<String, Value>;

pub const DATA_PART_TYPE_KEY: &str = "kagent.a2a_data_part_type";
pub const LONG_RUNNING_KEY: &str = "kagent.is_long_running";
pub const THOUGHT_KEY: &str = "kagent.is_thought";

pub const DATA_TYPE_FUNCTION_CALL: &str = "function-call";
pub const DATA_TYPE_FUNCTION_RESPONSE: &str = "function-response";
pub const DATA_TYPE_CODE_EXECUTION_RESULT: &str = "code-execution-result";
pub const DATA_TYPE_EXECUTABLE_CODE: &str = "executable-code";

fn metadata_is_empty(m: &Metadata) -> bool {
    m.is_empty()
}

trait MetadataExt {
    fn is_empty(&self) -> bool;
}

impl MetadataExt for Metadata {
    fn is_empty(&self) -> bool {
        metadata_is_empty(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    AuthRequired,
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub state: TaskState,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    StatusUpdate {
        task_id: String,
        context_id: String,
        status: Status,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
        #[serde(rename = "final")]
        is_final: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        partial: bool,
    },
    Artifact {
        task_id: String,
        context_id: String,
        parts: Vec<Part>,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
}

impl Event {
    pub fn status(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        state: TaskState,
        message: Option<String>,
        is_final: bool,
        partial: bool,
    ) -> Self {
        Event::StatusUpdate {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status: Status { state, timestamp: chrono::Utc::now(), message },
            metadata: Metadata::new(),
            is_final,
            partial,
        }
    }

    pub fn artifact(task_id: impl Into<String>, context_id: impl Into<String>, parts: Vec<Part>) -> Self {
        Event::Artifact {
            task_id: task_id.into(),
            context_id: context_id.into(),
            parts,
            metadata: Metadata::new(),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Event::StatusUpdate { is_final: true, .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    pub url: String,
    pub capabilities: Capabilities,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
}
