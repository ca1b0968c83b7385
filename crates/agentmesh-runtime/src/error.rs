use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("model call failed: {0}")]
    Model(#[from] agentmesh_llm::LlmError),

    #[error("tool call failed: {0}")]
    Tool(#[from] agentmesh_mcp::McpError),

    #[error("memory backend error: {0}")]
    Memory(#[from] agentmesh_memory::MemoryError),

    #[error("tool '{0}' is not declared in this agent's AgentConfig")]
    UnknownTool(String),

    #[error("step budget exceeded after {0} model round-trips")]
    BudgetExceeded(u32),

    #[error("workflow step '{0}' failed: {1}")]
    WorkflowStep(String, String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("task was canceled")]
    Canceled,
}

impl RuntimeError {
    /// Whether a tool-call failure is worth retrying inside the Event
    /// Pipeline (§7): transport hiccups and timeouts are, a named protocol
    /// error or an unknown tool is not.
    pub fn is_transient(&self) -> bool {
        match self {
            RuntimeError::Tool(inner) => matches!(
                inner,
                agentmesh_mcp::McpError::Timeout(_)
                    | agentmesh_mcp::McpError::Closed
                    | agentmesh_mcp::McpError::Io(_)
                    | agentmesh_mcp::McpError::Http(_)
            ),
            _ => false,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
