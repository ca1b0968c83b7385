//! SSE transport: the server pushes JSON-RPC responses over a long-lived
//! `GET` event stream; requests go out as separate `POST`s to an endpoint
//! the server announces in the stream's first `event: endpoint` frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, OnceCell};

use crate::error::{McpError, McpResult};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

use super::Transport;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, McpError>>>>>;

pub struct SseTransport {
    client: reqwest::Client,
    post_url: Arc<OnceCell<String>>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
    reader_task: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    pub async fn connect(stream_url: impl Into<String>, timeout: Duration) -> McpResult<Self> {
        let stream_url = stream_url.into();
        let client = reqwest::Client::builder().build().map_err(McpError::Http)?;
        let response = client.get(&stream_url).send().await?.error_for_status()?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let post_url: Arc<OnceCell<String>> = Arc::new(OnceCell::new());
        let reader_post_url = post_url.clone();
        let base = base_origin(&stream_url);

        let reader_task = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf = String::new();
            let mut current_event = String::new();

            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else { break };
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);

                    if let Some(event) = line.strip_prefix("event:") {
                        current_event = event.trim().to_string();
                    } else if let Some(data) = line.strip_prefix("data:") {
                        let data = data.trim();
                        match current_event.as_str() {
                            "endpoint" => {
                                let resolved = resolve_endpoint(&base, data);
                                let _ = reader_post_url.set(resolved);
                            }
                            _ => {
                                if let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(data) {
                                    dispatch_response(&reader_pending, resp);
                                }
                            }
                        }
                    }
                }
            }

            let mut guard = reader_pending.lock();
            for (_, sender) in guard.drain() {
                let _ = sender.send(Err(McpError::Closed));
            }
        });

        Ok(Self {
            client,
            post_url,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            reader_task,
        })
    }
}

fn base_origin(stream_url: &str) -> String {
    match reqwest::Url::parse(stream_url) {
        Ok(u) => format!("{}://{}", u.scheme(), u.authority()),
        Err(_) => stream_url.to_string(),
    }
}

fn resolve_endpoint(base: &str, announced: &str) -> String {
    if announced.starts_with("http://") || announced.starts_with("https://") {
        announced.to_string()
    } else {
        format!("{base}{announced}")
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
impl Transport for SseTransport {
    async fn call(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let post_url = self
            .post_url
            .get()
            .ok_or_else(|| McpError::Transport("SSE endpoint not yet announced by server".into()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        self.client
            .post(post_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

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
        self.reader_task.abort();
        Ok(())
    }
}
