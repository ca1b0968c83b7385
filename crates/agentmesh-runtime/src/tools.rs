//! Tool invocation seam: resolves a tool name against the AgentConfig's
//! `http_tools`/`sse_tools` tables and calls it over MCP (§4.7 step 4).

use std::collections::HashMap;

use agentmesh_core::AgentConfig;
use agentmesh_mcp::{McpClient, McpClientBuilder};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{RuntimeError, RuntimeResult};

#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn call(&self, name: &str, args: Value) -> RuntimeResult<Value>;

    /// Whether `name` is on the configured long-running tool list.
    fn is_long_running(&self, name: &str) -> bool;
}

/// Builds one MCP client per declared tool endpoint, deduplicated by URL so
/// a server exposing several tools only gets one connection.
pub struct McpToolClient {
    clients_by_tool: HashMap<String, std::sync::Arc<McpClient>>,
    long_running: Vec<String>,
}

impl McpToolClient {
    pub async fn from_agent_config(config: &AgentConfig, long_running: Vec<String>) -> RuntimeResult<Self> {
        let mut clients_by_url: HashMap<String, std::sync::Arc<McpClient>> = HashMap::new();
        let mut clients_by_tool = HashMap::new();

        for http_tool in &config.http_tools {
            let client = Self::client_for_url(&mut clients_by_url, &http_tool.url, false).await?;
            clients_by_tool.insert(http_tool.name.clone(), client);
        }
        for sse_tool in &config.sse_tools {
            let client = Self::client_for_url(&mut clients_by_url, &sse_tool.url, true).await?;
            clients_by_tool.insert(sse_tool.name.clone(), client);
        }

        Ok(Self { clients_by_tool, long_running })
    }

    async fn client_for_url(
        cache: &mut HashMap<String, std::sync::Arc<McpClient>>,
        url: &str,
        sse: bool,
    ) -> RuntimeResult<std::sync::Arc<McpClient>> {
        if let Some(existing) = cache.get(url) {
            return Ok(existing.clone());
        }

        let builder = if sse { McpClientBuilder::new().sse(url) } else { McpClientBuilder::new().http(url) };
        let client = if sse { builder.build_async().await } else { builder.build() }
            .map_err(RuntimeError::Tool)?;
        client.initialize().await.map_err(RuntimeError::Tool)?;

        let client = std::sync::Arc::new(client);
        cache.insert(url.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl ToolClient for McpToolClient {
    async fn call(&self, name: &str, args: Value) -> RuntimeResult<Value> {
        let client = self.clients_by_tool.get(name).ok_or_else(|| RuntimeError::UnknownTool(name.to_string()))?;
        client.call_tool(name, args).await.map_err(RuntimeError::Tool)
    }

    fn is_long_running(&self, name: &str) -> bool {
        self.long_running.iter().any(|t| t == name)
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use dashmap::DashMap;

    /// Tool client used by the pipeline's scenario tests (§8): responses
    /// are pre-seeded by tool name rather than reached over the network.
    #[derive(Default)]
    pub struct FakeToolClient {
        pub responses: DashMap<String, Value>,
        pub long_running: Vec<String>,
        /// Number of times a call to this tool should fail with a
        /// transient error before falling through to `responses`.
        pub transient_failures: DashMap<String, u32>,
    }

    #[async_trait]
    impl ToolClient for FakeToolClient {
        async fn call(&self, name: &str, _args: Value) -> RuntimeResult<Value> {
            if let Some(mut remaining) = self.transient_failures.get_mut(name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RuntimeError::Tool(agentmesh_mcp::McpError::Closed));
                }
            }
            self.responses
                .get(name)
                .map(|v| v.clone())
                .ok_or_else(|| RuntimeError::UnknownTool(name.to_string()))
        }

        fn is_long_running(&self, name: &str) -> bool {
            self.long_running.iter().any(|t| t == name)
        }
    }
}
