//! Workflow composition: Sequential / Parallel / Loop (§3, §4.4).

use serde::{Deserialize, Serialize};

use crate::resource::{AcceptedStatus, Resource};

/// A Team resource is a named Workflow composition, resolved through the
/// Dependency Index the same way any other resource reference is (§3:
/// "Team/Workflow composition reference").
pub type Team = Resource<TeamSpec, AcceptedStatus>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpec {
    #[serde(flatten)]
    pub pattern: WorkflowPattern,
}

/// Exactly one of Sequential, Parallel, or Loop must be set (§3 invariant
/// 3). Modeled as three independent optional fields rather than a tagged
/// enum because the on-wire shape keeps each pattern under its own key
/// regardless of which (or how many, invalidly) are present — the
/// Workflow Validator is what enforces the "exactly one" rule, not serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential: Option<SequentialSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looped: Option<LoopSpec>,
}

impl WorkflowPattern {
    /// The set pattern variants, in a stable order, for validation and for
    /// building the composition graph.
    pub fn set_variants(&self) -> Vec<&'static str> {
        let mut v = Vec::with_capacity(3);
        if self.sequential.is_some() {
            v.push("sequential");
        }
        if self.parallel.is_some() {
            v.push("parallel");
        }
        if self.looped.is_some() {
            v.push("loop");
        }
        v
    }

    pub fn sub_agents(&self) -> &[String] {
        if let Some(s) = &self.sequential {
            &s.sub_agents
        } else if let Some(p) = &self.parallel {
            &p.sub_agents
        } else if let Some(l) = &self.looped {
            &l.sub_agents
        } else {
            &[]
        }
    }

    pub fn discriminator(&self) -> Option<&'static str> {
        self.set_variants().into_iter().next()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialSpec {
    pub sub_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelSpec {
    pub sub_agents: Vec<String>,
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
}

fn default_max_workers() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSpec {
    pub sub_agents: Vec<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_variant_reports_correctly() {
        let p = WorkflowPattern {
            sequential: Some(SequentialSpec {
                sub_agents: vec!["a".into()],
            }),
            parallel: None,
            looped: None,
        };
        assert_eq!(p.set_variants(), vec!["sequential"]);
    }

    #[test]
    fn zero_or_two_variants_are_detectable_by_caller() {
        let none = WorkflowPattern::default();
        assert!(none.set_variants().is_empty());

        let two = WorkflowPattern {
            sequential: Some(SequentialSpec { sub_agents: vec!["a".into()] }),
            parallel: Some(ParallelSpec { sub_agents: vec!["a".into(), "b".into()], max_workers: 10 }),
            looped: None,
        };
        assert_eq!(two.set_variants().len(), 2);
    }

    #[test]
    fn defaults_match_spec() {
        let p = ParallelSpec { sub_agents: vec![], max_workers: default_max_workers() };
        assert_eq!(p.max_workers, 10);
        let l = LoopSpec { sub_agents: vec![], max_iterations: default_max_iterations() };
        assert_eq!(l.max_iterations, 5);
    }
}
