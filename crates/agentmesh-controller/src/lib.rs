//! The reconcile loop tying the Resource Registry, Dependency Index,
//! Reconcile Scheduler, Translator, Workflow Validator and Status Reporter
//! together into one running `Controller` (§4).

pub mod action;
pub mod dependency_index;
pub mod error;
pub mod scheduler;
pub mod status;
pub mod translator;
pub mod validator;
pub mod watcher;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentmesh_core::{AgentSpec, ResourceKind, ResourceManager};
use tokio::sync::RwLock;

pub use action::Action;
pub use error::{ControllerError, ControllerResult};

use dependency_index::DependencyIndex;
use scheduler::{ReconcileFn, ReconcileScheduler, SchedulerConfig};
use watcher::Watcher;

pub struct ControllerConfig {
    pub manifest_root: PathBuf,
    pub poll_interval: Duration,
    pub scheduler: SchedulerConfig,
}

/// Runs the full reconcile loop: load manifests, validate workflows,
/// translate Declarative/Workflow agents into `AgentConfig`, and write the
/// resulting Accepted condition.
pub struct Controller {
    resources: Arc<RwLock<ResourceManager>>,
    index: Arc<DependencyIndex>,
    scheduler: Arc<ReconcileScheduler>,
    watcher_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Controller {
    /// Load the initial manifest tree, build the dependency index from it,
    /// and start the worker pool and the filesystem poller.
    pub async fn start(config: ControllerConfig) -> ControllerResult<Self> {
        let mut initial = ResourceManager::new();
        initial.load_directory_tree(&config.manifest_root)?;

        let index = Arc::new(DependencyIndex::new());
        seed_index(&index, &initial);

        let resources = Arc::new(RwLock::new(initial));

        let reconcile_resources = resources.clone();
        let reconcile_fn: ReconcileFn = Arc::new(move |key| {
            let resources = reconcile_resources.clone();
            Box::pin(async move { reconcile_one(key, &resources).await })
        });

        let scheduler = Arc::new(ReconcileScheduler::start(config.scheduler, reconcile_fn));

        let mut watcher = Watcher::new(config.manifest_root.clone(), config.poll_interval);
        {
            let mut guard = resources.write().await;
            let changes = watcher.scan(&mut guard);
            watcher.apply_changes(&changes, &guard, &index, &scheduler);
        }

        let watcher_resources = resources.clone();
        let watcher_index = index.clone();
        let watcher_scheduler = scheduler.clone();
        let watcher_handle = tokio::spawn(async move {
            watcher
                .run_forever(watcher_resources, watcher_index, watcher_scheduler)
                .await;
        });

        Ok(Self {
            resources,
            index,
            scheduler,
            watcher_handle: Some(watcher_handle),
        })
    }

    pub fn resources(&self) -> Arc<RwLock<ResourceManager>> {
        self.resources.clone()
    }

    pub fn dependency_index(&self) -> Arc<DependencyIndex> {
        self.index.clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(handle) = self.watcher_handle.take() {
            handle.abort();
            // wait for the task to actually unwind so its Arc<ReconcileScheduler>
            // clone is dropped before we try to reclaim sole ownership below.
            let _ = handle.await;
        }
        match Arc::try_unwrap(self.scheduler) {
            Ok(scheduler) => scheduler.shutdown().await,
            Err(_) => tracing::warn!("scheduler still shared at shutdown; workers left running"),
        }
    }
}

fn seed_index(index: &DependencyIndex, resources: &ResourceManager) {
    for agent in resources.agents.get_all() {
        index.upsert(agent.resource_ref(ResourceKind::Agent), dependency_index::agent_deps(agent));
    }
    for mc in resources.model_configs.get_all() {
        index.upsert(
            mc.resource_ref(ResourceKind::ModelConfig),
            dependency_index::model_config_deps(mc),
        );
    }
    for ts in resources.tool_servers.get_all() {
        index.upsert(
            ts.resource_ref(ResourceKind::ToolServer),
            dependency_index::tool_server_deps(ts),
        );
    }
    for mem in resources.memories.get_all() {
        index.upsert(mem.resource_ref(ResourceKind::Memory), dependency_index::memory_deps(mem));
    }
    for team in resources.teams.get_all() {
        index.upsert(team.resource_ref(ResourceKind::Team), dependency_index::team_deps(team));
    }
}

/// Reconcile a single key: validate (if a workflow), translate, and report
/// status. Missing-reference and workflow errors are non-transient — they
/// are written to status and the key waits for the next watch event.
async fn reconcile_one(
    key: agentmesh_core::ResourceRef,
    resources: &Arc<RwLock<ResourceManager>>,
) -> ControllerResult<Action> {
    let (generation, existing_status, outcome) = {
        let guard = resources.read().await;

        match key.kind {
            ResourceKind::Agent => {
                let Some(agent) = guard.get_agent(&key.namespace, &key.name) else {
                    return Ok(Action::await_change());
                };

                let outcome = run_agent_reconcile(&key, agent, &guard);
                (agent.metadata.generation, agent.status.clone(), outcome)
            }
            _ => return Ok(Action::await_change()),
        }
    };

    let (cond_generation, condition) = match &outcome {
        Ok(()) => status::accepted(generation),
        Err(e) => status::rejected(generation, e),
    };

    let mut new_status = existing_status;
    if status::apply(&mut new_status, cond_generation, condition) {
        let mut guard = resources.write().await;
        guard.set_agent_status(&key.namespace, &key.name, new_status);
    }

    match outcome {
        Ok(()) => {
            tracing::info!(agent = %key, "reconciled");
            Ok(Action::await_change())
        }
        Err(e) => Err(e),
    }
}

/// Validate (if a workflow) and translate a single agent. Returns `Ok(())`
/// on success; the generated `AgentConfig` itself isn't needed here, only
/// whether translation succeeded, since the runtime reloads it independently.
fn run_agent_reconcile(
    key: &agentmesh_core::ResourceRef,
    agent: &agentmesh_core::Agent,
    guard: &ResourceManager,
) -> ControllerResult<()> {
    if let AgentSpec::Workflow(w) = &agent.spec {
        let ns = agent.metadata.namespace_or_default();
        validator::validate_cardinality(key, &w.pattern)?;
        validator::validate_references(key, &w.pattern, guard, ns)?;
        validator::detect_cycles(guard)?;
    }

    translator::translate(agent, guard).map(|_config| ())
}
