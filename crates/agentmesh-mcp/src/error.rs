use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to start MCP transport: {0}")]
    Transport(String),

    #[error("MCP server returned error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("tool '{0}' not found on this MCP server")]
    ToolNotFound(String),

    #[error("MCP request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("MCP transport closed before a response arrived")]
    Closed,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(any(feature = "http", feature = "sse"))]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type McpResult<T> = Result<T, McpError>;
