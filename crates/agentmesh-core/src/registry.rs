//! Resource registries: the in-process store the Watcher (agentmesh-controller)
//! populates and the Translator/Validator read against.
//!
//! In a full Kubernetes deployment this would be backed by an API server
//! watch; here it is a directory of YAML manifests kept current by
//! filesystem-change notifications (§2 ambient stack note on the Resource
//! Registry standing in for a real watch).

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::agent::{Agent, AgentSpec};
use crate::error::{AgentMeshError, AgentMeshResult};
use crate::memory::{Memory, MemorySpec};
use crate::model::{ModelConfig, ModelConfigSpec};
use crate::resource::{AcceptedStatus, Resource};
use crate::toolserver::{ToolServer, ToolServerSpec};
use crate::workflow::{Team, TeamSpec};

/// Common trait for all resource registries.
pub trait Registry<T> {
    fn load_directory(&mut self, path: &Path) -> AgentMeshResult<usize>;
    fn get(&self, namespace: &str, name: &str) -> Option<&T>;
    fn get_mut(&mut self, namespace: &str, name: &str) -> Option<&mut T>;
    fn get_all(&self) -> Vec<&T>;
    fn register(&mut self, resource: T) -> AgentMeshResult<()>;
    fn count(&self) -> usize;
    fn exists(&self, namespace: &str, name: &str) -> bool {
        self.get(namespace, name).is_some()
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// A generic registry over any resource spec type, keyed by
/// `namespace/name`.
#[derive(Debug)]
pub struct ResourceStore<Spec> {
    resources: HashMap<String, Resource<Spec, AcceptedStatus>>,
}

impl<Spec> Default for ResourceStore<Spec> {
    fn default() -> Self {
        Self {
            resources: HashMap::new(),
        }
    }
}

impl<Spec> ResourceStore<Spec> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(|s| s.as_str())
    }
}

impl<Spec: DeserializeOwned + Serialize> Registry<Resource<Spec, AcceptedStatus>> for ResourceStore<Spec> {
    fn load_directory(&mut self, path: &Path) -> AgentMeshResult<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(path).map_err(|e| AgentMeshError::Io {
            path: path.display().to_string(),
            source: e,
        })? {
            let entry = entry.map_err(|e| AgentMeshError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            let file_path = entry.path();
            if !file_path
                .extension()
                .map_or(false, |e| e == "yaml" || e == "yml")
            {
                continue;
            }
            match load_yaml_file::<Resource<Spec, AcceptedStatus>>(&file_path) {
                Ok(resource) => {
                    let k = key(resource.metadata.namespace_or_default(), &resource.metadata.name);
                    tracing::debug!(resource = %k, path = %file_path.display(), "loaded resource");
                    self.resources.insert(k, resource);
                    count += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %file_path.display(), error = %e, "failed to load resource");
                }
            }
        }
        Ok(count)
    }

    fn get(&self, namespace: &str, name: &str) -> Option<&Resource<Spec, AcceptedStatus>> {
        self.resources.get(&key(namespace, name))
    }

    fn get_mut(&mut self, namespace: &str, name: &str) -> Option<&mut Resource<Spec, AcceptedStatus>> {
        self.resources.get_mut(&key(namespace, name))
    }

    fn get_all(&self) -> Vec<&Resource<Spec, AcceptedStatus>> {
        self.resources.values().collect()
    }

    fn register(&mut self, resource: Resource<Spec, AcceptedStatus>) -> AgentMeshResult<()> {
        let k = key(resource.metadata.namespace_or_default(), &resource.metadata.name);
        self.resources.insert(k, resource);
        Ok(())
    }

    fn count(&self) -> usize {
        self.resources.len()
    }
}

fn load_yaml_file<T: DeserializeOwned>(path: &Path) -> AgentMeshResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| AgentMeshError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let de = serde_yaml::Deserializer::from_str(&content);
    serde_path_to_error::deserialize(de).map_err(|e| AgentMeshError::Deserialize {
        path: path.display().to_string(),
        source: e,
    })
}

pub type AgentRegistry = ResourceStore<AgentSpec>;
pub type ModelConfigRegistry = ResourceStore<ModelConfigSpec>;
pub type ToolServerRegistry = ResourceStore<ToolServerSpec>;
pub type MemoryRegistry = ResourceStore<MemorySpec>;
pub type TeamRegistry = ResourceStore<TeamSpec>;

/// Aggregates every per-kind registry. This is the read surface the
/// Translator and Workflow Validator resolve references against.
#[derive(Debug, Default)]
pub struct ResourceManager {
    pub agents: AgentRegistry,
    pub model_configs: ModelConfigRegistry,
    pub tool_servers: ToolServerRegistry,
    pub memories: MemoryRegistry,
    pub teams: TeamRegistry,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every kind from its conventional subdirectory of `root`:
    /// `agents/`, `modelconfigs/`, `toolservers/`, `memories/`, `teams/`.
    pub fn load_directory_tree(&mut self, root: &Path) -> AgentMeshResult<usize> {
        let mut total = 0;
        total += self.agents.load_directory(&root.join("agents"))?;
        total += self.model_configs.load_directory(&root.join("modelconfigs"))?;
        total += self.tool_servers.load_directory(&root.join("toolservers"))?;
        total += self.memories.load_directory(&root.join("memories"))?;
        total += self.teams.load_directory(&root.join("teams"))?;
        Ok(total)
    }

    pub fn get_agent(&self, namespace: &str, name: &str) -> Option<&Agent> {
        self.agents.get(namespace, name)
    }

    pub fn get_model_config(&self, namespace: &str, name: &str) -> Option<&ModelConfig> {
        self.model_configs.get(namespace, name)
    }

    pub fn get_tool_server(&self, namespace: &str, name: &str) -> Option<&ToolServer> {
        self.tool_servers.get(namespace, name)
    }

    pub fn get_memory(&self, namespace: &str, name: &str) -> Option<&Memory> {
        self.memories.get(namespace, name)
    }

    pub fn get_team(&self, namespace: &str, name: &str) -> Option<&Team> {
        self.teams.get(namespace, name)
    }

    /// Write a computed Accepted-condition status back onto a stored Agent.
    /// Returns `false` if the agent was removed between the read and this
    /// write (the caller should just drop the write; the next watch event
    /// will reconcile the deletion).
    pub fn set_agent_status(&mut self, namespace: &str, name: &str, status: AcceptedStatus) -> bool {
        match self.agents.get_mut(namespace, name) {
            Some(agent) => {
                agent.status = status;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSpec, DeclarativeAgentSpec, DeploymentHints};
    use crate::resource::ObjectMeta;
    use std::io::Write;

    fn sample_agent(name: &str) -> Agent {
        Agent {
            api_version: "agentmesh.dev/v1alpha1".into(),
            kind: "Agent".into(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: Some("default".into()),
                generation: 1,
                ..Default::default()
            },
            spec: AgentSpec::Declarative(DeclarativeAgentSpec {
                instruction: "help".into(),
                model_config: "gpt4".into(),
                tools: vec![],
                memory: None,
                deployment: DeploymentHints::default(),
                tls: None,
                stream: false,
            }),
            status: AcceptedStatus::default(),
        }
    }

    #[test]
    fn register_and_get_round_trips() {
        let mut reg = AgentRegistry::new();
        reg.register(sample_agent("my-agent")).unwrap();
        assert_eq!(reg.count(), 1);
        assert!(reg.exists("default", "my-agent"));
        assert!(!reg.exists("default", "missing"));
    }

    #[test]
    fn load_directory_reads_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("a.yaml")).unwrap();
        write!(
            file,
            "apiVersion: agentmesh.dev/v1alpha1\nkind: Agent\nmetadata:\n  name: from-disk\n  namespace: default\n  generation: 1\nspec:\n  type: declarative\n  instruction: hi\n  modelConfig: gpt4\n"
        )
        .unwrap();

        let mut reg = AgentRegistry::new();
        let loaded = reg.load_directory(dir.path()).unwrap();
        assert_eq!(loaded, 1);
        assert!(reg.exists("default", "from-disk"));
    }

    #[test]
    fn load_directory_on_missing_path_returns_zero() {
        let mut reg = AgentRegistry::new();
        let loaded = reg.load_directory(Path::new("/does/not/exist")).unwrap();
        assert_eq!(loaded, 0);
    }
}
