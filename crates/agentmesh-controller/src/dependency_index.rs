//! Bidirectional dependency index (§4.1).
//!
//! `deps(X)` is what `X` needs to be resolved; `rdeps(X)` is who needs `X`.
//! Mutation is single-writer per key — the reconciler owning that key is
//! the only writer of its `deps` entry — but reads may happen concurrently
//! from any worker, so both maps are `DashMap`s rather than behind one
//! global lock.

use std::collections::HashSet;

use dashmap::DashMap;

use agentmesh_core::{Agent, AgentSpec, Memory, ModelConfig, ResourceRef, Team, ToolServer};

/// Tracks the dependency graph induced by resolved references, and answers
/// the Watcher's "who must be re-reconciled" queries.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    deps: DashMap<ResourceRef, HashSet<ResourceRef>>,
    rdeps: DashMap<ResourceRef, HashSet<ResourceRef>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute `deps(of)`, diff against the previous set, and update both
    /// maps. Returns `{of} ∪ rdeps(of)` — the keys that must be
    /// re-reconciled as a result (§4.1).
    pub fn upsert(&self, of: ResourceRef, new_deps: HashSet<ResourceRef>) -> HashSet<ResourceRef> {
        let old_deps = self
            .deps
            .insert(of.clone(), new_deps.clone())
            .unwrap_or_default();

        for removed in old_deps.difference(&new_deps) {
            if let Some(mut entry) = self.rdeps.get_mut(removed) {
                entry.remove(&of);
            }
        }
        for added in new_deps.difference(&old_deps) {
            self.rdeps.entry(added.clone()).or_default().insert(of.clone());
        }

        let mut affected = self.dependants(&of);
        affected.insert(of);
        affected
    }

    /// Enqueue targets for a deleted resource, then drop it from both maps.
    /// Per §3 invariant 6, callers must finish enqueuing/reconciling
    /// `rdeps(of)` before this removes `of`'s own edges.
    pub fn remove(&self, of: &ResourceRef) -> HashSet<ResourceRef> {
        let affected = self.dependants(of);
        if let Some((_, old_deps)) = self.deps.remove(of) {
            for dep in old_deps {
                if let Some(mut entry) = self.rdeps.get_mut(&dep) {
                    entry.remove(of);
                }
            }
        }
        self.rdeps.remove(of);
        affected
    }

    /// Direct dependants of `target` (who references it directly).
    pub fn dependants(&self, target: &ResourceRef) -> HashSet<ResourceRef> {
        self.rdeps.get(target).map(|e| e.clone()).unwrap_or_default()
    }

    /// Transitive dependants of `target`, via bounded BFS over `rdeps`
    /// (§4.1: "changes to S enqueue all agents that transitively depend on
    /// it... computed by a bounded BFS").
    pub fn transitive_dependants(&self, target: &ResourceRef, max_depth: usize) -> HashSet<ResourceRef> {
        let mut seen = HashSet::new();
        let mut frontier = vec![target.clone()];
        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for node in &frontier {
                for d in self.dependants(node) {
                    if seen.insert(d.clone()) {
                        next.push(d);
                    }
                }
            }
            frontier = next;
        }
        seen
    }

    pub fn deps_of(&self, of: &ResourceRef) -> HashSet<ResourceRef> {
        self.deps.get(of).map(|e| e.clone()).unwrap_or_default()
    }
}

/// Extract the direct references out of an Agent's spec: model-config,
/// tool servers, memory, and (for Workflow agents) sub-agents.
pub fn agent_deps(agent: &Agent) -> HashSet<ResourceRef> {
    let ns = agent.metadata.namespace_or_default();
    let mut out = HashSet::new();
    match &agent.spec {
        AgentSpec::Declarative(d) => {
            out.insert(ResourceRef::parse(agentmesh_core::ResourceKind::ModelConfig, &d.model_config, ns));
            for tool in &d.tools {
                if let Some(server) = tool.server_name() {
                    out.insert(ResourceRef::parse(agentmesh_core::ResourceKind::ToolServer, server, ns));
                }
            }
            if let Some(mem) = &d.memory {
                out.insert(ResourceRef::parse(agentmesh_core::ResourceKind::Memory, mem, ns));
            }
        }
        AgentSpec::Workflow(w) => {
            for sub in w.pattern.sub_agents() {
                out.insert(ResourceRef::parse(agentmesh_core::ResourceKind::Agent, sub, ns));
            }
        }
        AgentSpec::Byo(_) => {}
    }
    out
}

/// ModelConfig's own dependency: the secret it references. The index
/// tracks this as an opaque `ResourceRef` even though secrets aren't a
/// registry-backed kind — existence is checked separately (§3: "Secret").
pub fn model_config_deps(model_config: &ModelConfig) -> HashSet<ResourceRef> {
    let ns = model_config.metadata.namespace_or_default();
    let mut out = HashSet::new();
    out.insert(ResourceRef::new(
        agentmesh_core::ResourceKind::ModelConfig,
        ns,
        format!("secret:{}", model_config.spec.api_key_secret),
    ));
    out
}

pub fn tool_server_deps(_tool_server: &ToolServer) -> HashSet<ResourceRef> {
    HashSet::new()
}

pub fn memory_deps(memory: &Memory) -> HashSet<ResourceRef> {
    let ns = memory.metadata.namespace_or_default();
    let mut out = HashSet::new();
    if let Some(model) = &memory.spec.embedding_model {
        out.insert(ResourceRef::parse(agentmesh_core::ResourceKind::ModelConfig, model, ns));
    }
    out
}

pub fn team_deps(team: &Team) -> HashSet<ResourceRef> {
    let ns = team.metadata.namespace_or_default();
    team.spec
        .pattern
        .sub_agents()
        .iter()
        .map(|sub| ResourceRef::parse(agentmesh_core::ResourceKind::Agent, sub, ns))
        .collect()
}
