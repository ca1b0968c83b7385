//! Session store (§4.10, §6): an append-only per-session event log keyed by
//! `(app_name, user_id, session_id)`. Two backends, same durability tier as
//! the Memory subsystem: in-process (default) and file-backed JSON.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{RuntimeError, RuntimeResult};
use crate::protocol::ConversationMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: String,
    pub text: String,
}

impl From<&ConversationMessage> for StoredMessage {
    fn from(message: &ConversationMessage) -> Self {
        let text = message
            .parts
            .iter()
            .filter_map(|p| match p {
                crate::protocol::ContentPart::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        StoredMessage { role: message.role.as_wire_str().to_string(), text }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionRecord {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub events: Vec<StoredMessage>,
}

/// Build the `app_name` per §6: `<namespace>__NS__<agent-name>` when both
/// are set, else just the agent name.
pub fn app_name(namespace: Option<&str>, agent_name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}__NS__{agent_name}"),
        _ => agent_name.to_string(),
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Idempotent: loads the session if it exists, otherwise creates one.
    async fn load_or_create(&self, app_name: &str, user_id: &str, session_id: &str) -> RuntimeResult<SessionRecord>;
    async fn append(&self, app_name: &str, user_id: &str, session_id: &str, message: StoredMessage) -> RuntimeResult<()>;
}

fn key(app_name: &str, user_id: &str, session_id: &str) -> String {
    format!("{app_name}/{user_id}/{session_id}")
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_or_create(&self, app_name: &str, user_id: &str, session_id: &str) -> RuntimeResult<SessionRecord> {
        let k = key(app_name, user_id, session_id);
        let record = self
            .sessions
            .entry(k)
            .or_insert_with(|| SessionRecord {
                app_name: app_name.to_string(),
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                events: Vec::new(),
            })
            .clone();
        Ok(record)
    }

    async fn append(&self, app_name: &str, user_id: &str, session_id: &str, message: StoredMessage) -> RuntimeResult<()> {
        let k = key(app_name, user_id, session_id);
        self.sessions
            .entry(k)
            .or_insert_with(|| SessionRecord {
                app_name: app_name.to_string(),
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                events: Vec::new(),
            })
            .events
            .push(message);
        Ok(())
    }
}

/// Persists the whole session map as one JSON file, same durability tier
/// as `agentmesh_memory::FileBackend`: survives restarts of a single
/// runtime process, not a substitute for multi-cluster persistence.
pub struct FileSessionStore {
    path: PathBuf,
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl FileSessionStore {
    pub async fn new(path: impl Into<PathBuf>) -> RuntimeResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| RuntimeError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let sessions = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| RuntimeError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self { path, sessions: Arc::new(RwLock::new(sessions)) })
    }

    async fn persist(&self) -> RuntimeResult<()> {
        let sessions = self.sessions.read().await;
        let content = serde_json::to_string_pretty(&*sessions)?;
        drop(sessions);
        tokio::fs::write(&self.path, content).await.map_err(|e| RuntimeError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_or_create(&self, app_name: &str, user_id: &str, session_id: &str) -> RuntimeResult<SessionRecord> {
        let k = key(app_name, user_id, session_id);
        {
            let sessions = self.sessions.read().await;
            if let Some(record) = sessions.get(&k) {
                return Ok(record.clone());
            }
        }
        let record = SessionRecord {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            events: Vec::new(),
        };
        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(k, record.clone());
        }
        self.persist().await?;
        Ok(record)
    }

    async fn append(&self, app_name: &str, user_id: &str, session_id: &str, message: StoredMessage) -> RuntimeResult<()> {
        let k = key(app_name, user_id, session_id);
        {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(k)
                .or_insert_with(|| SessionRecord {
                    app_name: app_name.to_string(),
                    user_id: user_id.to_string(),
                    session_id: session_id.to_string(),
                    events: Vec::new(),
                })
                .events
                .push(message);
        }
        self.persist().await
    }
}
