//! Workflow Executor (§4.9): Sequential/Parallel/Loop sub-agent
//! orchestration. Sub-agents are opaque collaborators reached over HTTP
//! (§4.3's remote-agent endpoint convention); this module only owns the
//! composition semantics, not what a sub-agent does internally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};
use crate::protocol::{self, ContentPart};
use crate::wire::{self, Part};

/// The tool name a sub-agent calls to ask a Loop step to stop early (§4.9).
pub const EXIT_LOOP_FUNCTION_NAME: &str = "exit_loop";

/// Context threaded through a workflow run. Sequential/Loop share one
/// instance (an evolving event log); Parallel gives each branch its own
/// clone of the initial state (§4.9: "independent copy of the initial
/// context").
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    pub events: Vec<Value>,
    pub iteration: u32,
}

impl WorkflowContext {
    pub fn push(&mut self, event: Value) {
        self.events.push(event);
    }
}

#[derive(Debug, Clone)]
pub struct SubAgentOutcome {
    pub artifact: Value,
    /// Set when the sub-agent invoked the designated exit-loop tool;
    /// meaningful only inside a Loop step.
    pub exit_loop: bool,
}

#[async_trait]
pub trait SubAgentInvoker: Send + Sync {
    async fn invoke(&self, sub_agent: &str, context: &WorkflowContext) -> RuntimeResult<SubAgentOutcome>;
}

/// Production invoker: resolves a sub-agent name against the AgentConfig's
/// `remote_agents` endpoint table and reaches it over the same `POST /`
/// surface every agent exposes (§4.3, §6). The evolving context is handed
/// over as a single `Data` part; the sub-agent's own final artifact and
/// any `exit_loop` function call in its response become the outcome.
pub struct HttpSubAgentInvoker {
    client: reqwest::Client,
    urls: HashMap<String, String>,
}

impl HttpSubAgentInvoker {
    pub fn new(client: reqwest::Client, remote_agents: &[agentmesh_core::RemoteAgentSection]) -> Self {
        let urls = remote_agents.iter().map(|r| (r.name.clone(), r.url.clone())).collect();
        Self { client, urls }
    }

    fn step_failed(sub_agent: &str, reason: impl std::fmt::Display) -> RuntimeError {
        RuntimeError::WorkflowStep(sub_agent.to_string(), reason.to_string())
    }
}

#[async_trait]
impl SubAgentInvoker for HttpSubAgentInvoker {
    async fn invoke(&self, sub_agent: &str, context: &WorkflowContext) -> RuntimeResult<SubAgentOutcome> {
        let url = self.urls.get(sub_agent).ok_or_else(|| RuntimeError::AgentNotFound(sub_agent.to_string()))?;

        let request = wire::SendMessageRequest {
            message: wire::WireMessage {
                role: "user".into(),
                parts: vec![Part::Data {
                    data: serde_json::json!({"events": context.events, "iteration": context.iteration}),
                    metadata: wire::Metadata::new(),
                }],
            },
            session_id: None,
            streaming: Some(false),
        };

        let response = self
            .client
            .post(url.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::step_failed(sub_agent, e))?
            .error_for_status()
            .map_err(|e| Self::step_failed(sub_agent, e))?;

        let events: Vec<wire::Event> = response.json().await.map_err(|e| Self::step_failed(sub_agent, e))?;

        let mut exit_loop = false;
        let mut text_parts = Vec::new();
        let mut failure: Option<String> = None;

        for event in &events {
            match event {
                wire::Event::Artifact { parts, .. } => {
                    for part in parts.clone() {
                        match protocol::inbound_parts(vec![part]).remove(0) {
                            ContentPart::Text { text, .. } => text_parts.push(text),
                            ContentPart::FunctionCall { name, .. } if name == EXIT_LOOP_FUNCTION_NAME => {
                                exit_loop = true;
                            }
                            _ => {}
                        }
                    }
                }
                wire::Event::StatusUpdate { status, is_final: true, .. } if status.state == wire::TaskState::Failed => {
                    failure = Some(status.message.clone().unwrap_or_else(|| "sub-agent task failed".into()));
                }
                _ => {}
            }
        }

        if let Some(reason) = failure {
            return Err(Self::step_failed(sub_agent, reason));
        }

        Ok(SubAgentOutcome { artifact: serde_json::json!({"sub_agent": sub_agent, "text": text_parts.join("")}), exit_loop })
    }
}

/// One step of a Sequential/Parallel/Loop run, reported to the caller as
/// it happens so a server layer can turn it into outbound wire events.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    SubAgentStarted { sub_agent: String },
    SubAgentCompleted { sub_agent: String, outcome: SubAgentOutcome },
    SubAgentFailed { sub_agent: String, error: String },
}

/// Sequential: visit sub-agents in order over one shared, evolving
/// context. A failing sub-agent is recorded and does not stop the walk.
pub async fn run_sequential(
    invoker: &dyn SubAgentInvoker,
    sub_agents: &[String],
    cancel: &CancellationToken,
    mut on_event: impl FnMut(WorkflowEvent),
) -> WorkflowContext {
    let mut context = WorkflowContext::default();

    for sub_agent in sub_agents {
        if cancel.is_cancelled() {
            break;
        }
        on_event(WorkflowEvent::SubAgentStarted { sub_agent: sub_agent.clone() });
        match invoker.invoke(sub_agent, &context).await {
            Ok(outcome) => {
                context.push(outcome.artifact.clone());
                on_event(WorkflowEvent::SubAgentCompleted { sub_agent: sub_agent.clone(), outcome });
            }
            Err(err) => {
                on_event(WorkflowEvent::SubAgentFailed { sub_agent: sub_agent.clone(), error: err.to_string() });
            }
        }
    }

    context
}

/// Observable counters for a Parallel run (§8 scenario 2: max concurrent
/// in-flight and total completions).
#[derive(Debug, Default)]
pub struct ParallelCounters {
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub completed: AtomicUsize,
}

/// Parallel: run up to `max_workers` sub-agents concurrently; the rest
/// queue. Each branch gets its own clone of `initial_context`; completions
/// are merged into the returned vec in completion order (not input order).
pub async fn run_parallel(
    invoker: Arc<dyn SubAgentInvoker>,
    sub_agents: &[String],
    max_workers: u32,
    initial_context: WorkflowContext,
    cancel: &CancellationToken,
    counters: &ParallelCounters,
    mut on_event: impl FnMut(WorkflowEvent),
) -> Vec<(String, RuntimeResult<SubAgentOutcome>)> {
    type PendingFuture = std::pin::Pin<Box<dyn std::future::Future<Output = (String, RuntimeResult<SubAgentOutcome>)> + Send>>;

    fn spawn(
        invoker: &Arc<dyn SubAgentInvoker>,
        initial_context: &WorkflowContext,
        counters: &ParallelCounters,
        sub_agent: String,
    ) -> PendingFuture {
        let invoker = invoker.clone();
        let context = initial_context.clone();
        let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_active.fetch_max(active, Ordering::SeqCst);
        Box::pin(async move {
            let outcome = invoker.invoke(&sub_agent, &context).await;
            (sub_agent, outcome)
        })
    }

    let max_workers = max_workers.max(1) as usize;
    let mut pending: std::collections::VecDeque<String> = sub_agents.iter().cloned().collect();
    let mut in_flight: FuturesUnordered<PendingFuture> = FuturesUnordered::new();
    let mut results = Vec::with_capacity(sub_agents.len());

    for _ in 0..max_workers {
        if let Some(sub_agent) = pending.pop_front() {
            on_event(WorkflowEvent::SubAgentStarted { sub_agent: sub_agent.clone() });
            in_flight.push(spawn(&invoker, &initial_context, counters, sub_agent));
        }
    }

    while let Some((sub_agent, outcome)) = in_flight.next().await {
        counters.active.fetch_sub(1, Ordering::SeqCst);
        counters.completed.fetch_add(1, Ordering::SeqCst);

        match &outcome {
            Ok(o) => on_event(WorkflowEvent::SubAgentCompleted { sub_agent: sub_agent.clone(), outcome: o.clone() }),
            Err(e) => on_event(WorkflowEvent::SubAgentFailed { sub_agent: sub_agent.clone(), error: e.to_string() }),
        }
        results.push((sub_agent, outcome));

        if cancel.is_cancelled() {
            pending.clear();
            continue;
        }
        if let Some(next) = pending.pop_front() {
            on_event(WorkflowEvent::SubAgentStarted { sub_agent: next.clone() });
            in_flight.push(spawn(&invoker, &initial_context, counters, next));
        }
    }

    results
}

/// Loop: repeat the sub-agent sequence, accumulating context across
/// iterations, until `max_iterations` is reached or a sub-agent exits.
pub async fn run_loop(
    invoker: &dyn SubAgentInvoker,
    sub_agents: &[String],
    max_iterations: u32,
    cancel: &CancellationToken,
    mut on_event: impl FnMut(WorkflowEvent),
) -> WorkflowContext {
    let mut context = WorkflowContext::default();

    'iterations: for iteration in 0..max_iterations {
        context.iteration = iteration;
        for sub_agent in sub_agents {
            if cancel.is_cancelled() {
                break 'iterations;
            }
            on_event(WorkflowEvent::SubAgentStarted { sub_agent: sub_agent.clone() });
            match invoker.invoke(sub_agent, &context).await {
                Ok(outcome) => {
                    context.push(outcome.artifact.clone());
                    let exit = outcome.exit_loop;
                    on_event(WorkflowEvent::SubAgentCompleted { sub_agent: sub_agent.clone(), outcome });
                    if exit {
                        break 'iterations;
                    }
                }
                Err(err) => {
                    on_event(WorkflowEvent::SubAgentFailed { sub_agent: sub_agent.clone(), error: err.to_string() });
                }
            }
        }
    }

    context
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use dashmap::DashMap;

    /// Scripted sub-agent invoker: each call records start/finish order and
    /// an optional artificial delay so Parallel's bounded-concurrency
    /// behavior is actually exercised rather than completing instantly.
    #[derive(Default)]
    pub struct FakeSubAgentInvoker {
        pub failures: DashMap<String, String>,
        pub exit_loop_after: DashMap<String, u32>,
        pub delay: Option<std::time::Duration>,
    }

    #[async_trait]
    impl SubAgentInvoker for FakeSubAgentInvoker {
        async fn invoke(&self, sub_agent: &str, context: &WorkflowContext) -> RuntimeResult<SubAgentOutcome> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(reason) = self.failures.get(sub_agent) {
                return Err(crate::error::RuntimeError::WorkflowStep(sub_agent.to_string(), reason.clone()));
            }
            let exit_loop = self
                .exit_loop_after
                .get(sub_agent)
                .map(|iter| context.iteration >= *iter)
                .unwrap_or(false);
            Ok(SubAgentOutcome { artifact: serde_json::json!({"sub_agent": sub_agent}), exit_loop })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeSubAgentInvoker;
    use super::*;

    #[tokio::test]
    async fn http_invoker_rejects_an_unresolved_sub_agent_name() {
        let invoker = HttpSubAgentInvoker::new(reqwest::Client::new(), &[]);
        let err = invoker.invoke("unknown", &WorkflowContext::default()).await.unwrap_err();
        assert!(matches!(err, crate::error::RuntimeError::AgentNotFound(name) if name == "unknown"));
    }

    #[tokio::test]
    async fn sequential_continues_past_a_failing_sub_agent() {
        let invoker = FakeSubAgentInvoker::default();
        invoker.failures.insert("B".into(), "boom".into());
        let cancel = CancellationToken::new();
        let mut events = Vec::new();

        let context = run_sequential(&invoker, &["A".into(), "B".into(), "C".into()], &cancel, |e| events.push(e)).await;

        assert_eq!(context.events.len(), 2, "A and C complete; B's failure contributes no artifact");
        let failed = events.iter().any(|e| matches!(e, WorkflowEvent::SubAgentFailed { sub_agent, .. } if sub_agent == "B"));
        assert!(failed);
        let c_completed = events.iter().any(|e| matches!(e, WorkflowEvent::SubAgentCompleted { sub_agent, .. } if sub_agent == "C"));
        assert!(c_completed, "C must still run after B fails");
    }

    #[tokio::test]
    async fn parallel_respects_max_workers_bound() {
        let invoker = Arc::new(FakeSubAgentInvoker { delay: Some(std::time::Duration::from_millis(5)), ..Default::default() });
        let sub_agents: Vec<String> = (0..20).map(|i| format!("agent-{i}")).collect();
        let cancel = CancellationToken::new();
        let counters = ParallelCounters::default();

        let results = run_parallel(invoker, &sub_agents, 5, WorkflowContext::default(), &cancel, &counters, |_| {}).await;

        assert_eq!(results.len(), 20);
        assert_eq!(counters.completed.load(Ordering::SeqCst), 20);
        assert!(counters.max_active.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn loop_terminates_on_exit_loop_tool_call() {
        let invoker = FakeSubAgentInvoker::default();
        invoker.exit_loop_after.insert("A".into(), 1);
        let cancel = CancellationToken::new();

        let context = run_loop(&invoker, &["A".into()], 100, &cancel, |_| {}).await;

        assert_eq!(context.iteration, 1, "should stop right after the iteration that exits");
        assert_eq!(context.events.len(), 2);
    }

    #[tokio::test]
    async fn loop_terminates_on_max_iterations_when_nothing_exits() {
        let invoker = FakeSubAgentInvoker::default();
        let cancel = CancellationToken::new();

        let context = run_loop(&invoker, &["A".into()], 3, &cancel, |_| {}).await;

        assert_eq!(context.events.len(), 3);
    }
}
