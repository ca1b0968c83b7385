//! Bridges the Workflow Executor's pure composition primitives
//! (`workflow_executor`) to the live task surface: seeds a `WorkflowContext`
//! from the inbound message, drives the configured pattern, and turns each
//! `WorkflowEvent` into the same outbound `wire::Event` stream a
//! model-driven task produces (§4.9, §6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agentmesh_core::WorkflowSection;

use crate::pipeline::TaskRequest;
use crate::protocol;
use crate::wire::{Event, Metadata, Part, TaskState};
use crate::workflow_executor::{
    run_loop, run_parallel, run_sequential, ParallelCounters, SubAgentInvoker, SubAgentOutcome, WorkflowContext, WorkflowEvent,
};

/// Runs one workflow-backed task to completion, writing every event to
/// `sender` in order, mirroring the Event Pipeline's single-final-event
/// guarantee (§4.7).
pub async fn run(
    invoker: Arc<dyn SubAgentInvoker>,
    workflow: WorkflowSection,
    request: TaskRequest,
    cancel: CancellationToken,
    sender: mpsc::Sender<Event>,
) {
    let task_id = request.task_id.clone();
    let context_id = request.context_id.clone();

    let (wf_tx, mut wf_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let forward_sender = sender.clone();
    let forward_task_id = task_id.clone();
    let forward_context_id = context_id.clone();
    let successes = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let forward_successes = successes.clone();
    let forward_failures = failures.clone();

    let forward = tokio::spawn(async move {
        while let Some(event) = wf_rx.recv().await {
            match &event {
                WorkflowEvent::SubAgentCompleted { .. } => {
                    forward_successes.fetch_add(1, Ordering::SeqCst);
                }
                WorkflowEvent::SubAgentFailed { .. } => {
                    forward_failures.fetch_add(1, Ordering::SeqCst);
                }
                WorkflowEvent::SubAgentStarted { .. } => {}
            }
            for wire_event in to_wire_events(&forward_task_id, &forward_context_id, event) {
                if forward_sender.send(wire_event).await.is_err() {
                    return;
                }
            }
        }
    });

    let seed_parts = protocol::outbound_parts(&request.message, &[]);
    let mut initial_context = WorkflowContext::default();
    initial_context.push(serde_json::json!({"role": "user", "parts": seed_parts}));

    let on_event = move |event: WorkflowEvent| {
        let _ = wf_tx.send(event);
    };

    match workflow {
        WorkflowSection::Sequential { sub_agents } => {
            run_sequential(invoker.as_ref(), &sub_agents, &cancel, on_event).await;
        }
        WorkflowSection::Parallel { sub_agents, max_workers } => {
            let counters = ParallelCounters::default();
            run_parallel(invoker, &sub_agents, max_workers, initial_context, &cancel, &counters, on_event).await;
        }
        WorkflowSection::Loop { sub_agents, max_iterations } => {
            run_loop(invoker.as_ref(), &sub_agents, max_iterations, &cancel, on_event).await;
        }
    }

    let _ = forward.await;

    let final_state = if successes.load(Ordering::SeqCst) == 0 && failures.load(Ordering::SeqCst) > 0 {
        TaskState::Failed
    } else {
        TaskState::Completed
    };
    let message = (final_state == TaskState::Failed).then(|| "every sub-agent in this workflow failed".to_string());
    let _ = sender.send(Event::status(&task_id, &context_id, final_state, message, true, false)).await;
}

fn to_wire_events(task_id: &str, context_id: &str, event: WorkflowEvent) -> Vec<Event> {
    match event {
        WorkflowEvent::SubAgentStarted { sub_agent } => {
            vec![Event::status(task_id, context_id, TaskState::Working, Some(format!("starting {sub_agent}")), false, false)]
        }
        WorkflowEvent::SubAgentCompleted { sub_agent, outcome } => {
            vec![Event::artifact(task_id, context_id, vec![sub_agent_part(&sub_agent, &outcome, None)])]
        }
        WorkflowEvent::SubAgentFailed { sub_agent, error } => {
            let outcome = SubAgentOutcome { artifact: serde_json::Value::Null, exit_loop: false };
            vec![Event::artifact(task_id, context_id, vec![sub_agent_part(&sub_agent, &outcome, Some(error))])]
        }
    }
}

fn sub_agent_part(sub_agent: &str, outcome: &SubAgentOutcome, error: Option<String>) -> Part {
    let mut metadata = Metadata::new();
    let data = match error {
        Some(error) => serde_json::json!({"subAgent": sub_agent, "error": error, "isError": true}),
        None => serde_json::json!({"subAgent": sub_agent, "result": outcome.artifact}),
    };
    metadata.insert("kagent.workflow_step".to_string(), serde_json::json!(sub_agent));
    Part::Data { data, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ContentPart;
    use crate::workflow_executor::fake::FakeSubAgentInvoker;

    fn new_request() -> TaskRequest {
        TaskRequest {
            namespace: None,
            agent_name: "router-bot".into(),
            user_id: "u1".into(),
            session_id: "s1".into(),
            task_id: "t1".into(),
            context_id: "t1".into(),
            message: vec![ContentPart::text("route this")],
            streaming: false,
        }
    }

    async fn drain(mut rx: mpsc::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn sequential_workflow_completes_when_every_sub_agent_succeeds() {
        let invoker = Arc::new(FakeSubAgentInvoker::default());
        let workflow = WorkflowSection::Sequential { sub_agents: vec!["a".into(), "b".into()] };
        let (tx, rx) = mpsc::channel(16);

        run(invoker, workflow, new_request(), CancellationToken::new(), tx).await;
        let events = drain(rx).await;

        let last = events.last().unwrap();
        match last {
            Event::StatusUpdate { status, is_final, .. } => {
                assert!(*is_final);
                assert_eq!(status.state, TaskState::Completed);
            }
            _ => panic!("expected a final completed event"),
        }
        let artifacts = events.iter().filter(|e| matches!(e, Event::Artifact { .. })).count();
        assert_eq!(artifacts, 2);
    }

    #[tokio::test]
    async fn workflow_fails_when_every_sub_agent_fails() {
        let invoker = FakeSubAgentInvoker::default();
        invoker.failures.insert("a".into(), "boom".into());
        let workflow = WorkflowSection::Sequential { sub_agents: vec!["a".into()] };
        let (tx, rx) = mpsc::channel(16);

        run(Arc::new(invoker), workflow, new_request(), CancellationToken::new(), tx).await;
        let events = drain(rx).await;

        let last = events.last().unwrap();
        match last {
            Event::StatusUpdate { status, is_final, .. } => {
                assert!(*is_final);
                assert_eq!(status.state, TaskState::Failed);
            }
            _ => panic!("expected a final failed event"),
        }
    }

    #[tokio::test]
    async fn parallel_workflow_runs_every_sub_agent() {
        let invoker = Arc::new(FakeSubAgentInvoker::default());
        let workflow = WorkflowSection::Parallel { sub_agents: vec!["a".into(), "b".into(), "c".into()], max_workers: 2 };
        let (tx, rx) = mpsc::channel(16);

        run(invoker, workflow, new_request(), CancellationToken::new(), tx).await;
        let events = drain(rx).await;

        let artifacts = events.iter().filter(|e| matches!(e, Event::Artifact { .. })).count();
        assert_eq!(artifacts, 3);
    }
}
