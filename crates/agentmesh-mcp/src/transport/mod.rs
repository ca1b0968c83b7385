//! The three transports an MCP server may speak (§ ambient tool-calling
//! surface): stdio (local subprocess), SSE and plain HTTP (remote).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpResult;

#[cfg(feature = "stdio")]
pub mod stdio;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "sse")]
pub mod sse;

/// A request/response channel to one MCP server. Implementations own
/// whatever connection state (subprocess, HTTP client, SSE stream) the
/// transport needs and are responsible for correlating concurrent calls
/// by JSON-RPC id.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, params: Option<Value>) -> McpResult<Value>;

    /// Best-effort teardown (kill the child process, close the socket).
    /// Transports that have nothing to release can no-op.
    async fn shutdown(&self) -> McpResult<()>;
}
