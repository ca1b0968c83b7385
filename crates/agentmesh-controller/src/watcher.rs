//! Watcher (§4.1): turns resource changes into reconcile requests.
//!
//! Resources are backed by a directory of YAML manifests (§2's ambient
//! stack note on the Resource Registry standing in for a real API-server
//! watch). The Watcher polls that directory on an interval, diffs observed
//! generations against the last-seen snapshot, and feeds the Dependency
//! Index and Reconcile Scheduler accordingly.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use agentmesh_core::{ResourceKind, ResourceManager, ResourceRef};

use crate::dependency_index::{
    agent_deps, memory_deps, model_config_deps, team_deps, tool_server_deps, DependencyIndex,
};
use crate::scheduler::ReconcileScheduler;

/// Change type the Watcher detected for a single key, mirroring §4.1's
/// `OnEvent(kind, ns, name, changeType)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Upsert,
    Delete,
}

pub struct Watcher {
    manifest_root: PathBuf,
    poll_interval: Duration,
    last_seen_generations: HashMap<ResourceRef, i64>,
}

impl Watcher {
    pub fn new(manifest_root: PathBuf, poll_interval: Duration) -> Self {
        Self {
            manifest_root,
            poll_interval,
            last_seen_generations: HashMap::new(),
        }
    }

    /// Reload the manifest tree and return the set of changes since the
    /// last scan, without yet touching the dependency index or scheduler
    /// (kept separate from [`Watcher::run_forever`] so reconcile logic can
    /// be unit-tested against a fixed scan).
    pub fn scan(&mut self, resources: &mut ResourceManager) -> Vec<(ResourceRef, ChangeType)> {
        *resources = ResourceManager::new();
        let _ = resources.load_directory_tree(&self.manifest_root);

        let mut current = HashMap::new();
        for agent in resources.agents.get_all() {
            current.insert(agent.resource_ref(ResourceKind::Agent), agent.metadata.generation);
        }
        for mc in resources.model_configs.get_all() {
            current.insert(mc.resource_ref(ResourceKind::ModelConfig), mc.metadata.generation);
        }
        for ts in resources.tool_servers.get_all() {
            current.insert(ts.resource_ref(ResourceKind::ToolServer), ts.metadata.generation);
        }
        for mem in resources.memories.get_all() {
            current.insert(mem.resource_ref(ResourceKind::Memory), mem.metadata.generation);
        }
        for team in resources.teams.get_all() {
            current.insert(team.resource_ref(ResourceKind::Team), team.metadata.generation);
        }

        let mut changes = Vec::new();
        for (reference, generation) in &current {
            match self.last_seen_generations.get(reference) {
                Some(prev) if prev == generation => {}
                _ => changes.push((reference.clone(), ChangeType::Upsert)),
            }
        }
        for reference in self.last_seen_generations.keys() {
            if !current.contains_key(reference) {
                changes.push((reference.clone(), ChangeType::Delete));
            }
        }

        self.last_seen_generations = current;
        changes
    }

    /// Apply a batch of changes to the dependency index and enqueue the
    /// affected keys on the scheduler (§4.1's `OnEvent`).
    pub fn apply_changes(
        &self,
        changes: &[(ResourceRef, ChangeType)],
        resources: &ResourceManager,
        index: &DependencyIndex,
        scheduler: &ReconcileScheduler,
    ) {
        for (reference, change) in changes {
            match change {
                ChangeType::Upsert => {
                    let deps = resolve_deps(reference, resources);
                    let affected = index.upsert(reference.clone(), deps);
                    scheduler.enqueue_many(affected);
                }
                ChangeType::Delete => {
                    let affected = index.remove(reference);
                    scheduler.enqueue_many(affected);
                }
            }
        }
    }

    pub async fn run_forever(
        mut self,
        resources: std::sync::Arc<tokio::sync::RwLock<ResourceManager>>,
        index: std::sync::Arc<DependencyIndex>,
        scheduler: std::sync::Arc<ReconcileScheduler>,
    ) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            let mut guard = resources.write().await;
            let changes = self.scan(&mut guard);
            if !changes.is_empty() {
                tracing::debug!(count = changes.len(), "watcher detected resource changes");
                self.apply_changes(&changes, &guard, &index, &scheduler);
            }
        }
    }
}

fn resolve_deps(reference: &ResourceRef, resources: &ResourceManager) -> HashSet<ResourceRef> {
    match reference.kind {
        ResourceKind::Agent => resources
            .get_agent(&reference.namespace, &reference.name)
            .map(agent_deps)
            .unwrap_or_default(),
        ResourceKind::ModelConfig => resources
            .get_model_config(&reference.namespace, &reference.name)
            .map(model_config_deps)
            .unwrap_or_default(),
        ResourceKind::ToolServer => resources
            .get_tool_server(&reference.namespace, &reference.name)
            .map(tool_server_deps)
            .unwrap_or_default(),
        ResourceKind::Memory => resources
            .get_memory(&reference.namespace, &reference.name)
            .map(memory_deps)
            .unwrap_or_default(),
        ResourceKind::Team => resources
            .get_team(&reference.namespace, &reference.name)
            .map(team_deps)
            .unwrap_or_default(),
    }
}
