//! A Model Context Protocol client speaking stdio, SSE, or plain HTTP to a
//! single tool server, used by the runtime to resolve `http_tools`/
//! `sse_tools` sections of an `AgentConfig` (and stdio tool servers it
//! launches itself) into callable tools.

pub mod error;
pub mod protocol;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

pub use error::{McpError, McpResult};
pub use protocol::ToolInfo;
use protocol::{call_tool_params, initialize_params, ListToolsResult};
use transport::Transport;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct McpClient {
    transport: Arc<dyn Transport>,
}

impl McpClient {
    pub async fn initialize(&self) -> McpResult<()> {
        self.transport.call("initialize", Some(initialize_params())).await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> McpResult<Vec<ToolInfo>> {
        let result = self.transport.call("tools/list", None).await?;
        let parsed: ListToolsResult = serde_json::from_value(result)?;
        Ok(parsed.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value> {
        self.transport
            .call("tools/call", Some(call_tool_params(name, arguments)))
            .await
    }

    pub async fn shutdown(&self) -> McpResult<()> {
        self.transport.shutdown().await
    }
}

enum TransportSpec {
    #[cfg(feature = "stdio")]
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    #[cfg(feature = "http")]
    Http { url: String },
    #[cfg(feature = "sse")]
    Sse { url: String },
}

/// Builds an [`McpClient`] for exactly one transport; mirrors the three
/// transport kinds a `ToolServer` resource can declare.
pub struct McpClientBuilder {
    spec: Option<TransportSpec>,
    timeout: Duration,
}

impl Default for McpClientBuilder {
    fn default() -> Self {
        Self {
            spec: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl McpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(feature = "stdio")]
    pub fn stdio(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.spec = Some(TransportSpec::Stdio {
            command: command.into(),
            args,
            env: HashMap::new(),
        });
        self
    }

    #[cfg(feature = "stdio")]
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        if let Some(TransportSpec::Stdio { env: slot, .. }) = &mut self.spec {
            *slot = env;
        }
        self
    }

    #[cfg(feature = "http")]
    pub fn http(mut self, url: impl Into<String>) -> Self {
        self.spec = Some(TransportSpec::Http { url: url.into() });
        self
    }

    #[cfg(feature = "sse")]
    pub fn sse(mut self, url: impl Into<String>) -> Self {
        self.spec = Some(TransportSpec::Sse { url: url.into() });
        self
    }

    /// Build a stdio/http client synchronously. SSE requires an initial
    /// handshake and must go through [`McpClientBuilder::build_async`].
    pub fn build(self) -> McpResult<McpClient> {
        let spec = self
            .spec
            .ok_or_else(|| McpError::Transport("no transport configured".into()))?;
        let transport: Arc<dyn Transport> = match spec {
            #[cfg(feature = "stdio")]
            TransportSpec::Stdio { command, args, env } => {
                Arc::new(transport::stdio::StdioTransport::spawn(&command, &args, &env, self.timeout)?)
            }
            #[cfg(feature = "http")]
            TransportSpec::Http { url } => Arc::new(transport::http::HttpTransport::new(url, self.timeout)?),
            #[cfg(feature = "sse")]
            TransportSpec::Sse { .. } => {
                return Err(McpError::Transport(
                    "SSE transport requires build_async".into(),
                ))
            }
        };
        Ok(McpClient { transport })
    }

    #[cfg(feature = "sse")]
    pub async fn build_async(self) -> McpResult<McpClient> {
        let spec = self
            .spec
            .ok_or_else(|| McpError::Transport("no transport configured".into()))?;
        let transport: Arc<dyn Transport> = match spec {
            TransportSpec::Sse { url } => {
                Arc::new(transport::sse::SseTransport::connect(url, self.timeout).await?)
            }
            #[cfg(feature = "stdio")]
            TransportSpec::Stdio { command, args, env } => {
                Arc::new(transport::stdio::StdioTransport::spawn(&command, &args, &env, self.timeout)?)
            }
            #[cfg(feature = "http")]
            TransportSpec::Http { url } => Arc::new(transport::http::HttpTransport::new(url, self.timeout)?),
        };
        Ok(McpClient { transport })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "stdio")]
    #[tokio::test]
    async fn builder_requires_a_transport() {
        let err = McpClientBuilder::new().timeout(Duration::from_secs(1)).build();
        assert!(err.is_err());
    }

    #[cfg(feature = "stdio")]
    #[tokio::test]
    async fn stdio_builder_spawns_echo_process() {
        let client = McpClientBuilder::new().stdio("cat", vec![]).build();
        assert!(client.is_ok());
        if let Ok(client) = client {
            let _ = client.shutdown().await;
        }
    }
}
