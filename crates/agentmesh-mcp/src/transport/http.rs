//! Plain HTTP transport: one JSON-RPC request per POST, no persistent
//! connection or server-initiated messages.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

use super::Transport;

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> McpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(McpError::Http)?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<JsonRpcResponse>()
            .await?;

        if let Some(err) = response.error {
            return Err(McpError::Protocol {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn shutdown(&self) -> McpResult<()> {
        Ok(())
    }
}
