//! Stdio transport: a local child process speaking newline-delimited
//! JSON-RPC over stdin/stdout, the way `npx`-style MCP servers do.

use std::collections::HashMap;
use std::process::Stdio as ProcStdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

use super::Transport;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, McpError>>>>>;

pub struct StdioTransport {
    stdin: AsyncMutex<tokio::process::ChildStdin>,
    child: AsyncMutex<Child>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl StdioTransport {
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>, timeout: Duration) -> McpResult<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(ProcStdio::piped())
            .stdout(ProcStdio::piped())
            .stderr(ProcStdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::Transport(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("child has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("child has no stdout".into()))?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcResponse>(&line) {
                            Ok(resp) => dispatch_response(&reader_pending, resp),
                            Err(e) => tracing::warn!(error = %e, "unparseable MCP stdout line"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "MCP stdout read error");
                        break;
                    }
                }
            }
            // the stream closed; fail every still-pending call rather than
            // hang them forever.
            let mut guard = reader_pending.lock();
            for (_, sender) in guard.drain() {
                let _ = sender.send(Err(McpError::Closed));
            }
        });

        Ok(Self {
            stdin: AsyncMutex::new(stdin),
            child: AsyncMutex::new(child),
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            reader_task: Some(reader_task),
        })
    }
}

fn dispatch_response(pending: &Pending, resp: JsonRpcResponse) {
    let Some(id) = resp.id else { return };
    let sender = { pending.lock().remove(&id) };
    let Some(sender) = sender else { return };
    if let Some(err) = resp.error {
        let _ = sender.send(Err(McpError::Protocol {
            code: err.code,
            message: err.message,
        }));
    } else {
        let _ = sender.send(Ok(resp.result.unwrap_or(Value::Null)));
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn call(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        {
            let mut stdin = self.stdin.lock().await;
            stdin
                .write_all(&line)
                .await
                .map_err(|e| McpError::Transport(e.to_string()))?;
            stdin.flush().await.map_err(|e| McpError::Transport(e.to_string()))?;
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(McpError::Timeout(self.timeout))
            }
        }
    }

    async fn shutdown(&self) -> McpResult<()> {
        if let Some(handle) = &self.reader_task {
            handle.abort();
        }
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        Ok(())
    }
}
