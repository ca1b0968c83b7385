//! Axum HTTP surface (§6): `POST /`, `GET /.well-known/agent.json`,
//! `GET /health`, `GET /healthz`. Enriched from the pack's axum-based
//! example server since the teacher itself never exposed an HTTP API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::agent_card;
use crate::model::ModelClient;
use crate::pipeline::PipelineConfig;
use crate::protocol;
use crate::session::SessionStore;
use crate::tools::ToolClient;
use crate::wire::{AgentCard, Event, SendMessageRequest};
use crate::workflow_executor::HttpSubAgentInvoker;

pub struct RuntimeState {
    pub config: agentmesh_core::AgentConfig,
    pub base_url: String,
    pub namespace: Option<String>,
    pub user_id: String,
    pub model: Arc<dyn ModelClient>,
    pub tools: Arc<dyn ToolClient>,
    pub sessions: Arc<dyn SessionStore>,
    pub pipeline_config: PipelineConfig,
    pub http_client: reqwest::Client,
}

pub fn router(state: Arc<RuntimeState>) -> Router {
    Router::new()
        .route("/", post(send_message))
        .route("/.well-known/agent.json", get(agent_json))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn agent_json(State(state): State<Arc<RuntimeState>>) -> Json<AgentCard> {
    Json(agent_card::build(&state.config, &state.base_url))
}

/// `POST /`: accepts a send-message request and returns either the final
/// event as JSON (non-streaming) or a server-sent-events stream of every
/// event up to and including the final one (§6).
async fn send_message(State(state): State<Arc<RuntimeState>>, Json(request): Json<SendMessageRequest>) -> axum::response::Response {
    let streaming = request_wants_streaming(&request, state.config.stream);
    let message = protocol::inbound_parts(request.message.parts);

    let task = if let Some(workflow) = state.config.workflow.clone() {
        let invoker = Arc::new(HttpSubAgentInvoker::new(state.http_client.clone(), &state.config.remote_agents));
        crate::intake::accept_workflow(
            invoker,
            workflow,
            state.namespace.clone(),
            state.config.name.clone(),
            state.user_id.clone(),
            request.session_id,
            message,
        )
    } else {
        crate::intake::accept(
            state.model.clone(),
            state.tools.clone(),
            state.sessions.clone(),
            state.pipeline_config.clone(),
            state.namespace.clone(),
            state.config.name.clone(),
            state.user_id.clone(),
            request.session_id,
            message,
            streaming,
        )
    };

    if streaming {
        sse_response(task.events, task.cancel).into_response()
    } else {
        final_event_response(task.events).await.into_response()
    }
}

/// A request may opt in or out of streaming explicitly; absent a
/// preference, fall back to the agent's configured default (§6).
fn request_wants_streaming(request: &SendMessageRequest, agent_default: bool) -> bool {
    request.streaming.unwrap_or(agent_default)
}

async fn final_event_response(mut events: tokio::sync::mpsc::Receiver<Event>) -> Json<Vec<Event>> {
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        let is_final = event.is_final();
        collected.push(event);
        if is_final {
            break;
        }
    }
    Json(collected)
}

/// Cancels the task's token when dropped, whether the stream runs to
/// completion or the client disconnects mid-stream and axum drops it.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn sse_response(
    events: tokio::sync::mpsc::Receiver<Event>,
    cancel: CancellationToken,
) -> Sse<impl Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    let state = (events, CancelOnDrop(cancel));
    let stream = stream::unfold(state, |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        let payload = serde_json::to_string(&event).unwrap_or_default();
        Some((Ok(SseEvent::default().data(payload)), (rx, guard)))
    });
    Sse::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fake::{FakeModelClient, ScriptedTurn};
    use crate::session::InMemorySessionStore;
    use crate::tools::fake::FakeToolClient;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<RuntimeState> {
        test_state_with_workflow(None)
    }

    fn test_state_with_workflow(workflow: Option<agentmesh_core::WorkflowSection>) -> Arc<RuntimeState> {
        Arc::new(RuntimeState {
            config: agentmesh_core::AgentConfig {
                name: "billing-bot".into(),
                model: None,
                http_tools: vec![],
                sse_tools: vec![],
                remote_agents: vec![],
                memory: None,
                workflow,
                stream: false,
                context_config: None,
                resumability_config: None,
            },
            base_url: "http://billing-bot.default:8080".into(),
            namespace: None,
            user_id: "u1".into(),
            model: Arc::new(FakeModelClient::new(vec![ScriptedTurn::text("hi")])),
            tools: Arc::new(FakeToolClient::default()),
            sessions: Arc::new(InMemorySessionStore::new()),
            pipeline_config: PipelineConfig::default(),
            http_client: reqwest::Client::new(),
        })
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = router(test_state());
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_json_reflects_configured_name() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/.well-known/agent.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let card: AgentCard = serde_json::from_slice(&body).unwrap();
        assert_eq!(card.name, "billing-bot");
    }

    #[tokio::test]
    async fn send_message_returns_a_final_completed_event() {
        let app = router(test_state());
        let body = serde_json::to_vec(&SendMessageRequest {
            message: crate::wire::WireMessage { role: "user".into(), parts: vec![crate::wire::Part::Text { text: "hi".into(), metadata: Default::default() }] },
            session_id: None,
            streaming: None,
        })
        .unwrap();
        let response = app
            .oneshot(Request::builder().method("POST").uri("/").header("content-type", "application/json").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events: Vec<Event> = serde_json::from_slice(&bytes).unwrap();
        assert!(events.last().unwrap().is_final());
    }

    #[tokio::test]
    async fn send_message_dispatches_a_workflow_agent_into_the_executor() {
        let state = test_state_with_workflow(Some(agentmesh_core::WorkflowSection::Sequential { sub_agents: vec![] }));
        let app = router(state);

        let body = serde_json::to_vec(&SendMessageRequest {
            message: crate::wire::WireMessage { role: "user".into(), parts: vec![crate::wire::Part::Text { text: "go".into(), metadata: Default::default() }] },
            session_id: None,
            streaming: None,
        })
        .unwrap();
        let response = app
            .oneshot(Request::builder().method("POST").uri("/").header("content-type", "application/json").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events: Vec<Event> = serde_json::from_slice(&bytes).unwrap();
        assert!(events.last().unwrap().is_final());
    }

    #[test]
    fn request_streaming_preference_overrides_agent_default() {
        let mut request = SendMessageRequest {
            message: crate::wire::WireMessage { role: "user".into(), parts: vec![] },
            session_id: None,
            streaming: Some(true),
        };
        assert!(request_wants_streaming(&request, false));

        request.streaming = Some(false);
        assert!(!request_wants_streaming(&request, true));
    }

    #[test]
    fn request_streaming_falls_back_to_agent_default() {
        let request = SendMessageRequest {
            message: crate::wire::WireMessage { role: "user".into(), parts: vec![] },
            session_id: None,
            streaming: None,
        };
        assert!(request_wants_streaming(&request, true));
        assert!(!request_wants_streaming(&request, false));
    }

    #[tokio::test]
    async fn dropping_the_sse_stream_cancels_the_task() {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let cancel = CancellationToken::new();
        let sse = sse_response(rx, cancel.clone());
        assert!(!cancel.is_cancelled());
        drop(sse);
        assert!(cancel.is_cancelled(), "dropping the SSE stream (client disconnect) must cancel the task");
    }
}
