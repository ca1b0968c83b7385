//! Workflow Validator (§4.4): structural validation of workflow
//! compositions, applied in a fixed rule order where the first failing
//! rule wins.

use std::collections::{HashMap, HashSet};

use agentmesh_core::{ResourceKind, ResourceManager, ResourceRef, WorkflowPattern};

use crate::error::{ControllerError, ControllerResult};

const MAX_SUB_AGENTS_PER_WORKFLOW: usize = 50;

/// Rule 1-4: structural cardinality checks against a single pattern,
/// independent of the rest of the graph.
pub fn validate_cardinality(reference: &ResourceRef, pattern: &WorkflowPattern) -> ControllerResult<()> {
    let variants = pattern.set_variants();
    if variants.len() != 1 {
        return Err(ControllerError::DuplicateDiscriminator {
            reference: reference.clone(),
            present: variants,
        });
    }

    if let Some(seq) = &pattern.sequential {
        if seq.sub_agents.is_empty() {
            return Err(ControllerError::WorkflowCardinality {
                reference: reference.clone(),
                detail: "Sequential requires at least 1 sub-agent".into(),
            });
        }
    }
    if let Some(par) = &pattern.parallel {
        if !(2..=50).contains(&par.sub_agents.len()) {
            return Err(ControllerError::WorkflowCardinality {
                reference: reference.clone(),
                detail: format!(
                    "Parallel requires 2-50 sub-agents, got {}",
                    par.sub_agents.len()
                ),
            });
        }
        if !(1..=50).contains(&par.max_workers) {
            return Err(ControllerError::WorkflowCardinality {
                reference: reference.clone(),
                detail: format!("Parallel.maxWorkers must be in [1,50], got {}", par.max_workers),
            });
        }
    }
    if let Some(l) = &pattern.looped {
        if l.sub_agents.is_empty() {
            return Err(ControllerError::WorkflowCardinality {
                reference: reference.clone(),
                detail: "Loop requires at least 1 sub-agent".into(),
            });
        }
        if !(1..=100).contains(&l.max_iterations) {
            return Err(ControllerError::WorkflowCardinality {
                reference: reference.clone(),
                detail: format!("Loop.maxIterations must be in [1,100], got {}", l.max_iterations),
            });
        }
    }

    if pattern.sub_agents().len() > MAX_SUB_AGENTS_PER_WORKFLOW {
        return Err(ControllerError::WorkflowCardinality {
            reference: reference.clone(),
            detail: format!(
                "workflow total sub-agent count {} exceeds {}",
                pattern.sub_agents().len(),
                MAX_SUB_AGENTS_PER_WORKFLOW
            ),
        });
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Sequential,
    Parallel,
    Loop,
}

struct CompositionNode {
    kind: NodeKind,
    sub_agents: Vec<ResourceRef>,
}

/// Build the composition graph of every workflow-shaped node (Workflow
/// agents and Teams) keyed by resource ref.
fn build_graph(resources: &ResourceManager) -> HashMap<ResourceRef, CompositionNode> {
    let mut graph = HashMap::new();

    for agent in resources.agents.get_all() {
        if let agentmesh_core::AgentSpec::Workflow(w) = &agent.spec {
            let reference = agent.resource_ref(ResourceKind::Agent);
            let ns = agent.metadata.namespace_or_default();
            if let Some(node) = pattern_to_node(&w.pattern, ns) {
                graph.insert(reference, node);
            }
        }
    }
    for team in resources.teams.get_all() {
        let reference = team.resource_ref(ResourceKind::Team);
        let ns = team.metadata.namespace_or_default();
        if let Some(node) = pattern_to_node(&team.spec.pattern, ns) {
            graph.insert(reference, node);
        }
    }

    graph
}

fn pattern_to_node(pattern: &WorkflowPattern, ns: &str) -> Option<CompositionNode> {
    let kind = match pattern.discriminator()? {
        "sequential" => NodeKind::Sequential,
        "parallel" => NodeKind::Parallel,
        "loop" => NodeKind::Loop,
        _ => return None,
    };
    let sub_agents = pattern
        .sub_agents()
        .iter()
        .map(|s| ResourceRef::parse(ResourceKind::Agent, s, ns))
        .collect();
    Some(CompositionNode { kind, sub_agents })
}

/// Rule 5: DFS cycle detection. Only edges whose *source* node is
/// Sequential or Parallel are cycle-forming; edges out of a Loop node are
/// never followed for cycle-detection purposes, matching the decision
/// recorded for the Loop-through-Parallel open question — a cycle is
/// rejected only when every edge on the cycle originates at a
/// Sequential/Parallel node.
pub fn detect_cycles(resources: &ResourceManager) -> ControllerResult<()> {
    let graph = build_graph(resources);

    for start in graph.keys() {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        if let Some(cycle) = dfs(start, &graph, &mut path, &mut on_path) {
            let rendered = cycle
                .iter()
                .map(|r| r.name.clone())
                .collect::<Vec<_>>()
                .join(" → ");
            return Err(ControllerError::WorkflowCycle { path: rendered });
        }
    }
    Ok(())
}

fn dfs(
    node: &ResourceRef,
    graph: &HashMap<ResourceRef, CompositionNode>,
    path: &mut Vec<ResourceRef>,
    on_path: &mut HashSet<ResourceRef>,
) -> Option<Vec<ResourceRef>> {
    let Some(entry) = graph.get(node) else {
        return None;
    };

    // Loop nodes are a cycle boundary: do not traverse their outgoing
    // edges at all when looking for Sequential/Parallel cycles.
    if entry.kind == NodeKind::Loop {
        return None;
    }

    path.push(node.clone());
    on_path.insert(node.clone());

    for next in &entry.sub_agents {
        if on_path.contains(next) {
            let start = path.iter().position(|r| r == next).unwrap_or(0);
            let mut cycle: Vec<ResourceRef> = path[start..].to_vec();
            cycle.push(next.clone());
            return Some(cycle);
        }
        if let Some(cycle) = dfs(next, graph, path, on_path) {
            return Some(cycle);
        }
    }

    path.pop();
    on_path.remove(node);
    None
}

/// Rule 6: every sub-agent reference must resolve to an existing Agent.
pub fn validate_references(
    reference: &ResourceRef,
    pattern: &WorkflowPattern,
    resources: &ResourceManager,
    ns: &str,
) -> ControllerResult<()> {
    for sub in pattern.sub_agents() {
        let sub_ref = ResourceRef::parse(ResourceKind::Agent, sub, ns);
        if resources.get_agent(&sub_ref.namespace, &sub_ref.name).is_none() {
            return Err(ControllerError::MissingReference {
                reference: sub_ref,
            });
        }
    }
    let _ = reference;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::{LoopSpec, ParallelSpec, SequentialSpec};

    fn seq(sub_agents: Vec<&str>) -> WorkflowPattern {
        WorkflowPattern {
            sequential: Some(SequentialSpec {
                sub_agents: sub_agents.into_iter().map(String::from).collect(),
            }),
            parallel: None,
            looped: None,
        }
    }

    #[test]
    fn exactly_one_pattern_required() {
        let both = WorkflowPattern {
            sequential: Some(SequentialSpec { sub_agents: vec!["a".into()] }),
            parallel: Some(ParallelSpec { sub_agents: vec!["a".into(), "b".into()], max_workers: 5 }),
            looped: None,
        };
        let r = ResourceRef::new(ResourceKind::Agent, "default", "w1");
        let err = validate_cardinality(&r, &both).unwrap_err();
        assert!(matches!(err, ControllerError::DuplicateDiscriminator { .. }));
    }

    #[test]
    fn parallel_cardinality_bounds() {
        let r = ResourceRef::new(ResourceKind::Agent, "default", "w1");
        let too_few = WorkflowPattern {
            sequential: None,
            parallel: Some(ParallelSpec { sub_agents: vec!["a".into()], max_workers: 5 }),
            looped: None,
        };
        assert!(validate_cardinality(&r, &too_few).is_err());

        let ok = WorkflowPattern {
            sequential: None,
            parallel: Some(ParallelSpec { sub_agents: vec!["a".into(), "b".into()], max_workers: 5 }),
            looped: None,
        };
        assert!(validate_cardinality(&r, &ok).is_ok());
    }

    #[test]
    fn loop_max_iterations_bounds() {
        let r = ResourceRef::new(ResourceKind::Agent, "default", "w1");
        let bad = WorkflowPattern {
            sequential: None,
            parallel: None,
            looped: Some(LoopSpec { sub_agents: vec!["a".into()], max_iterations: 0 }),
        };
        assert!(validate_cardinality(&r, &bad).is_err());
    }

    #[test]
    fn sequential_cycle_is_rejected() {
        let mut resources = ResourceManager::new();
        let w1 = make_workflow_agent("w1", seq(vec!["w2"]));
        let w2 = make_workflow_agent("w2", seq(vec!["w1"]));
        resources.agents.register(w1).unwrap();
        resources.agents.register(w2).unwrap();

        let err = detect_cycles(&resources).unwrap_err();
        assert!(matches!(err, ControllerError::WorkflowCycle { .. }));
    }

    #[test]
    fn loop_back_edge_is_permitted() {
        let mut resources = ResourceManager::new();
        let w1 = make_workflow_agent("w1", seq(vec!["w2"]));
        let w2_pattern = WorkflowPattern {
            sequential: None,
            parallel: None,
            looped: Some(LoopSpec { sub_agents: vec!["w1".into()], max_iterations: 5 }),
        };
        let w2 = make_workflow_agent("w2", w2_pattern);
        resources.agents.register(w1).unwrap();
        resources.agents.register(w2).unwrap();

        assert!(detect_cycles(&resources).is_ok());
    }

    fn make_workflow_agent(name: &str, pattern: WorkflowPattern) -> agentmesh_core::Agent {
        use agentmesh_core::{AcceptedStatus, AgentSpec, ObjectMeta, WorkflowAgentSpec};
        agentmesh_core::Agent {
            api_version: "agentmesh.dev/v1alpha1".into(),
            kind: "Agent".into(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: Some("default".into()),
                generation: 1,
                ..Default::default()
            },
            spec: AgentSpec::Workflow(WorkflowAgentSpec { pattern, stream: false }),
            status: AcceptedStatus::default(),
        }
    }
}
