//! Task Intake (§4.6): accepts an inbound message, attaches it to a session
//! (creating one if needed), starts an Event Pipeline, and hands the caller
//! a streaming event channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::ModelClient;
use crate::pipeline::{self, PipelineConfig, TaskRequest};
use crate::protocol::ContentPart;
use crate::session::SessionStore;
use crate::tools::ToolClient;
use crate::wire::Event;
use crate::workflow_executor::SubAgentInvoker;
use crate::workflow_runner;

/// How many events the pipeline may buffer before it blocks the producer
/// (§4.7's backpressure rule: block, never drop).
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct AcceptedTask {
    pub task_id: String,
    pub session_id: String,
    pub events: mpsc::Receiver<Event>,
    pub cancel: CancellationToken,
}

/// Accepts one inbound message. `session_id` of `None` starts a fresh
/// session (`load_or_create` on a freshly-minted id is itself idempotent,
/// so a caller retrying the same accept is safe).
pub fn accept(
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolClient>,
    sessions: Arc<dyn SessionStore>,
    config: PipelineConfig,
    namespace: Option<String>,
    agent_name: String,
    user_id: String,
    session_id: Option<String>,
    message: Vec<ContentPart>,
    streaming: bool,
) -> AcceptedTask {
    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let task_id = Uuid::new_v4().to_string();
    let context_id = session_id.clone();
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let request = TaskRequest {
        namespace,
        agent_name,
        user_id,
        session_id: session_id.clone(),
        task_id: task_id.clone(),
        context_id,
        message,
        streaming,
    };

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        pipeline::run(model, tools, sessions, config, request, task_cancel, tx).await;
    });

    AcceptedTask { task_id, session_id, events: rx, cancel }
}

/// Accepts one inbound message for a Workflow agent (§4.9): same intake
/// shape as [`accept`], but drives `workflow_executor`'s Sequential/
/// Parallel/Loop composition over sub-agents instead of a model round-trip.
pub fn accept_workflow(
    invoker: Arc<dyn SubAgentInvoker>,
    workflow: agentmesh_core::WorkflowSection,
    namespace: Option<String>,
    agent_name: String,
    user_id: String,
    session_id: Option<String>,
    message: Vec<ContentPart>,
) -> AcceptedTask {
    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let task_id = Uuid::new_v4().to_string();
    let context_id = session_id.clone();
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let request = TaskRequest {
        namespace,
        agent_name,
        user_id,
        session_id: session_id.clone(),
        task_id: task_id.clone(),
        context_id,
        message,
        streaming: false,
    };

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        workflow_runner::run(invoker, workflow, request, task_cancel, tx).await;
    });

    AcceptedTask { task_id, session_id, events: rx, cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fake::{FakeModelClient, ScriptedTurn};
    use crate::session::InMemorySessionStore;
    use crate::tools::fake::FakeToolClient;

    #[tokio::test]
    async fn accept_with_null_session_mints_a_fresh_one() {
        let model = Arc::new(FakeModelClient::new(vec![ScriptedTurn::text("hi there")])) as Arc<dyn ModelClient>;
        let tools = Arc::new(FakeToolClient::default()) as Arc<dyn ToolClient>;
        let sessions = Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>;

        let mut task = accept(
            model,
            tools,
            sessions,
            PipelineConfig::default(),
            None,
            "billing-bot".into(),
            "u1".into(),
            None,
            vec![ContentPart::text("hello")],
            false,
        );

        assert!(!task.session_id.is_empty());
        let mut saw_final = false;
        while let Some(event) = task.events.recv().await {
            if event.is_final() {
                saw_final = true;
            }
        }
        assert!(saw_final, "expected exactly one final event before the channel closed");
    }

    #[tokio::test]
    async fn cancel_token_stops_an_in_flight_task() {
        let model = Arc::new(FakeModelClient::new(vec![ScriptedTurn::text("hi there")])) as Arc<dyn ModelClient>;
        let tools = Arc::new(FakeToolClient::default()) as Arc<dyn ToolClient>;
        let sessions = Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>;

        let task = accept(
            model,
            tools,
            sessions,
            PipelineConfig::default(),
            None,
            "billing-bot".into(),
            "u1".into(),
            Some("s1".into()),
            vec![ContentPart::text("hello")],
            false,
        );
        assert_eq!(task.session_id, "s1");
        task.cancel.cancel();
    }

    #[tokio::test]
    async fn accept_workflow_dispatches_into_the_workflow_executor() {
        use crate::workflow_executor::fake::FakeSubAgentInvoker;
        use agentmesh_core::WorkflowSection;

        let invoker = Arc::new(FakeSubAgentInvoker::default()) as Arc<dyn SubAgentInvoker>;
        let workflow = WorkflowSection::Sequential { sub_agents: vec!["a".into(), "b".into()] };

        let mut task = accept_workflow(invoker, workflow, None, "router-bot".into(), "u1".into(), None, vec![ContentPart::text("go")]);

        assert!(!task.session_id.is_empty());
        let mut saw_final = false;
        while let Some(event) = task.events.recv().await {
            if event.is_final() {
                saw_final = true;
            }
        }
        assert!(saw_final, "expected exactly one final event before the channel closed");
    }
}
