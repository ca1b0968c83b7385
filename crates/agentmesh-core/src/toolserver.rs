//! ToolServer / MCPServer: stdio-launched process descriptors or HTTP/SSE
//! endpoint descriptors (§3).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resource::{AcceptedStatus, Resource};

pub type ToolServer = Resource<ToolServerSpec, AcceptedStatus>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolServerSpec {
    #[serde(flatten)]
    pub transport: ToolServerTransport,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Restrict exposed tool names; empty means "all tools the server
    /// advertises".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_allowlist: Vec<String>,
}

impl ToolServerSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// The discriminated transport a tool server is reached over. Tagged by
/// `type` in the wire format per DESIGN NOTES' "dynamic discriminated
/// unions": explicit tag, reject unknown tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolServerTransport {
    Stdio {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
    },
    Http { url: String },
    Sse { url: String },
}

impl ToolServerTransport {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolServerTransport::Stdio { .. } => "stdio",
            ToolServerTransport::Http { .. } => "http",
            ToolServerTransport::Sse { .. } => "sse",
        }
    }
}
