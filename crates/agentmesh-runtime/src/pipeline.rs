//! Event Pipeline (§4.7): the per-task producer driving the model
//! round-trip loop and emitting wire events in strict order.
//!
//! State machine: `submitted → working ↔ {calling-tool, awaiting-tool-response}
//! → {completed | failed | canceled | input-required | auth-required}`.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};
use crate::model::{ModelClient, StreamChunk, ToolDeclaration};
use crate::protocol::{self, ContentPart, ConversationMessage, Role};
use crate::session::{app_name as build_app_name, SessionStore, StoredMessage};
use crate::tools::ToolClient;
use crate::wire::{self, Event, Part, TaskState};

/// Task-scoped knobs that don't belong to the AgentConfig document itself
/// (the auth-request function name and the step budget are runtime-local
/// policy, not part of the Translator's canonical output).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_steps: u32,
    pub auth_request_function: String,
    pub system_instruction: Option<String>,
    pub tool_declarations: Vec<ToolDeclaration>,
    /// Capped exponential backoff for transient tool-call failures (§7):
    /// `tool_retry_backoff_base * 2^attempt`, capped at `tool_retry_backoff_max`,
    /// up to `tool_retry_max_attempts` retries before surfacing an error
    /// response to the model.
    pub tool_retry_max_attempts: u32,
    pub tool_retry_backoff_base: Duration,
    pub tool_retry_backoff_max: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_steps: agentmesh_core::DEFAULT_MAX_STEPS,
            auth_request_function: String::new(),
            system_instruction: None,
            tool_declarations: Vec::new(),
            tool_retry_max_attempts: 2,
            tool_retry_backoff_base: Duration::from_millis(100),
            tool_retry_backoff_max: Duration::from_secs(2),
        }
    }
}

/// Capped exponential backoff, mirroring the Reconcile Scheduler's own
/// `backoff_for` (agentmesh-controller::scheduler).
fn tool_retry_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let scaled = base.saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX));
    scaled.min(max)
}

/// Call a tool, retrying transient failures with capped backoff before
/// falling back to an `{"error": ...}` response the model can see (§7).
async fn call_tool_with_retry(tools: &Arc<dyn ToolClient>, name: &str, args: &serde_json::Value, config: &PipelineConfig) -> serde_json::Value {
    let mut attempt = 0u32;
    loop {
        match tools.call(name, args.clone()).await {
            Ok(value) => return value,
            Err(err) if err.is_transient() && attempt < config.tool_retry_max_attempts => {
                attempt += 1;
                let delay = tool_retry_backoff(attempt, config.tool_retry_backoff_base, config.tool_retry_backoff_max);
                tracing::warn!(tool = name, attempt, error = %err, "transient tool failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return serde_json::json!({"error": err.to_string()}),
        }
    }
}

pub struct TaskRequest {
    pub namespace: Option<String>,
    pub agent_name: String,
    pub user_id: String,
    pub session_id: String,
    pub task_id: String,
    pub context_id: String,
    pub message: Vec<ContentPart>,
    pub streaming: bool,
}

/// Runs one task's Event Pipeline to completion, writing every event to
/// `sender` in order. `sender` is a bounded channel: per §4.7's backpressure
/// rule the pipeline blocks on a full queue rather than drop events, and
/// treats a closed receiver (the caller disconnected) as a cancellation.
pub async fn run(
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolClient>,
    sessions: Arc<dyn SessionStore>,
    config: PipelineConfig,
    request: TaskRequest,
    cancel: CancellationToken,
    sender: mpsc::Sender<Event>,
) {
    let app_name = build_app_name(request.namespace.as_deref(), &request.agent_name);
    let task_id = request.task_id.clone();
    let context_id = request.context_id.clone();

    if let Err(err) = run_inner(
        &model,
        &tools,
        &sessions,
        &config,
        &app_name,
        &request,
        &cancel,
        &sender,
    )
    .await
    {
        if matches!(err, RuntimeError::Canceled) {
            let _ = sender
                .send(Event::status(&task_id, &context_id, TaskState::Canceled, None, true, false))
                .await;
            return;
        }
        let (code, message) = runtime_error_wire(&err);
        let _ = sender
            .send(Event::status(&task_id, &context_id, TaskState::Failed, Some(message), true, false))
            .await;
        tracing::warn!(task_id = %task_id, error = %err, code, "event pipeline terminated with a runtime error");
    }
}

fn runtime_error_wire(err: &RuntimeError) -> (&'static str, String) {
    match err {
        RuntimeError::BudgetExceeded(_) => ("budget-exceeded", err.to_string()),
        RuntimeError::Tool(_) => ("tool-error", err.to_string()),
        RuntimeError::Model(_) => ("model-error", err.to_string()),
        RuntimeError::UnknownTool(_) => ("unknown-tool", err.to_string()),
        _ => ("internal-error", err.to_string()),
    }
}

async fn run_inner(
    model: &Arc<dyn ModelClient>,
    tools: &Arc<dyn ToolClient>,
    sessions: &Arc<dyn SessionStore>,
    config: &PipelineConfig,
    app_name: &str,
    request: &TaskRequest,
    cancel: &CancellationToken,
    sender: &mpsc::Sender<Event>,
) -> RuntimeResult<()> {
    let record = sessions
        .load_or_create(app_name, &request.user_id, &request.session_id)
        .await?;

    let mut conversation: Vec<ConversationMessage> = record
        .events
        .iter()
        .map(|stored| ConversationMessage { role: role_from_wire(&stored.role), parts: vec![ContentPart::text(stored.text.clone())] })
        .collect();
    conversation.push(ConversationMessage { role: Role::User, parts: request.message.clone() });

    sessions
        .append(
            app_name,
            &request.user_id,
            &request.session_id,
            StoredMessage::from(&conversation[conversation.len() - 1]),
        )
        .await?;

    let mut step = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Canceled);
        }
        if step >= config.max_steps {
            return Err(RuntimeError::BudgetExceeded(config.max_steps));
        }
        step += 1;

        let turn = call_model(model.as_ref(), config, &conversation, request, sender, cancel).await?;

        if let crate::model::FinishReason::Error { code, message } = &turn.finish {
            send(sender, Event::status(&request.task_id, &request.context_id, TaskState::Failed, Some(message.clone()), true, false)).await?;
            tracing::warn!(task_id = %request.task_id, code = %code, "model turn finished with a non-normal-completion reason");
            return Ok(());
        }

        let function_calls: Vec<(String, String, serde_json::Value)> =
            turn.function_calls().map(|(id, name, args)| (id.to_string(), name.to_string(), args.clone())).collect();

        if function_calls.is_empty() {
            if let Some(text) = turn.text() {
                send(sender, Event::status(&request.task_id, &request.context_id, TaskState::Working, None, false, false)).await?;
                send(
                    sender,
                    Event::artifact(&request.task_id, &request.context_id, protocol::outbound_parts(&[ContentPart::text(text.clone())], &[])),
                )
                .await?;
                sessions
                    .append(
                        app_name,
                        &request.user_id,
                        &request.session_id,
                        StoredMessage { role: Role::Model.as_wire_str().to_string(), text: text.clone() },
                    )
                    .await?;
                send(sender, Event::status(&request.task_id, &request.context_id, TaskState::Completed, Some(text), true, false)).await?;
            } else {
                send(sender, Event::status(&request.task_id, &request.context_id, TaskState::Completed, None, true, false)).await?;
            }
            return Ok(());
        }

        conversation.push(ConversationMessage { role: Role::Model, parts: turn.parts.clone() });

        let long_running_ids: Vec<(String, String)> =
            function_calls.iter().filter(|(_, name, _)| tools.is_long_running(name)).map(|(id, name, _)| (id.clone(), name.clone())).collect();

        let mut terminal: Option<TaskState> = None;
        let mut response_parts = Vec::with_capacity(function_calls.len());

        for (id, name, args) in &function_calls {
            if cancel.is_cancelled() {
                return Err(RuntimeError::Canceled);
            }

            let long_running_for_event: Vec<String> = if long_running_ids.iter().any(|(i, _)| i == id) {
                vec![id.clone()]
            } else {
                Vec::new()
            };
            let call_part = protocol::outbound_parts(&[ContentPart::FunctionCall { id: id.clone(), name: name.clone(), args: args.clone() }], &long_running_for_event);
            send(sender, Event::status(&request.task_id, &request.context_id, TaskState::Working, None, false, false)).await?;
            send(sender, Event::artifact(&request.task_id, &request.context_id, call_part)).await?;

            let response = call_tool_with_retry(tools, name, args, config).await;

            let response_part = ContentPart::FunctionResponse { id: id.clone(), name: name.clone(), response };
            let wire_response = protocol::outbound_parts(std::slice::from_ref(&response_part), &[]);
            send(sender, Event::artifact(&request.task_id, &request.context_id, wire_response)).await?;
            response_parts.push(response_part);

            if name == &config.auth_request_function {
                terminal = Some(TaskState::AuthRequired);
                break;
            }
            if tools.is_long_running(name) {
                terminal = Some(TaskState::InputRequired);
                break;
            }
        }

        conversation.push(ConversationMessage { role: Role::Tool, parts: response_parts });

        if let Some(state) = terminal {
            send(sender, Event::status(&request.task_id, &request.context_id, state, None, true, false)).await?;
            return Ok(());
        }
    }
}

async fn call_model(
    model: &dyn ModelClient,
    config: &PipelineConfig,
    conversation: &[ConversationMessage],
    request: &TaskRequest,
    sender: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
) -> RuntimeResult<crate::model::ModelTurn> {
    if !request.streaming {
        return model
            .complete(config.system_instruction.as_deref(), conversation, &config.tool_declarations)
            .await;
    }

    let mut stream = model
        .complete_streaming(config.system_instruction.as_deref(), conversation, &config.tool_declarations)
        .await?;

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Canceled);
        }
        match chunk? {
            StreamChunk::TextDelta(delta) => {
                send(
                    sender,
                    Event::status(&request.task_id, &request.context_id, TaskState::Working, Some(delta), false, true),
                )
                .await?;
            }
            StreamChunk::Final(turn) => return Ok(turn),
        }
    }

    Err(RuntimeError::Model(agentmesh_llm::LlmError::Provider {
        status: 0,
        body: "model stream ended without a final chunk".into(),
    }))
}

async fn send(sender: &mpsc::Sender<Event>, event: Event) -> RuntimeResult<()> {
    sender.send(event).await.map_err(|_| RuntimeError::Canceled)
}

fn role_from_wire(role: &str) -> Role {
    match role {
        "model" => Role::Model,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}
