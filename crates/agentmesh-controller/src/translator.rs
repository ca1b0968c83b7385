//! Translator (§4.3): pure function from a resolved resource closure to a
//! canonical `AgentConfig` document. Must not read "now", random, or
//! uncommitted state — everything it needs comes from `resources`.

use agentmesh_core::{
    identifier, Agent, AgentConfig, AgentSpec, EmbeddingSection, HttpToolSection,
    MemoryBackendKind, MemorySection, ModelSection, RemoteAgentSection, ResourceKind,
    ResourceManager, ResourceRef, SseToolSection, ToolServerTransport, WorkflowSection,
    DEFAULT_AGENT_PORT,
};

use crate::error::{ControllerError, ControllerResult};

/// Map a resource name to the token the runtime actually sees (§4.3).
fn runtime_name(name: &str) -> String {
    identifier::to_runtime(&identifier::canon(name))
}

/// Translate a root Agent into its generated `AgentConfig`. Fails with a
/// typed, enumerated error on the first unresolved reference rather than
/// emitting a partial document (§4.3: "it never produces a partial
/// AgentConfig").
pub fn translate(agent: &Agent, resources: &ResourceManager) -> ControllerResult<AgentConfig> {
    let ns = agent.metadata.namespace_or_default();
    let name = agent.metadata.name.clone();
    let runtime_agent_name = runtime_name(&name);

    match &agent.spec {
        AgentSpec::Declarative(d) => {
            let model_ref = ResourceRef::parse(ResourceKind::ModelConfig, &d.model_config, ns);
            let model_config = resources
                .get_model_config(&model_ref.namespace, &model_ref.name)
                .ok_or_else(|| ControllerError::MissingReference {
                    reference: model_ref.clone(),
                })?;

            let model = ModelSection {
                provider: model_config.spec.provider.clone(),
                model: model_config.spec.model.clone(),
                base_url: model_config.spec.base_url.clone(),
                tls_material: model_config
                    .spec
                    .tls
                    .as_ref()
                    .and_then(|t| t.ca_bundle_secret.clone()),
                headers: Default::default(),
                temperature: model_config.spec.temperature,
                max_tokens: model_config.spec.max_tokens,
            };

            let mut http_tools = Vec::new();
            let mut sse_tools = Vec::new();
            for tool in &d.tools {
                let server_name = tool.server_name().unwrap_or(&name);
                let server_ref = ResourceRef::parse(ResourceKind::ToolServer, server_name, ns);
                let server = resources
                    .get_tool_server(&server_ref.namespace, &server_ref.name)
                    .ok_or_else(|| ControllerError::MissingReference {
                        reference: server_ref.clone(),
                    })?;

                match &server.spec.transport {
                    ToolServerTransport::Http { url } => http_tools.push(HttpToolSection {
                        name: tool.tool_name().to_string(),
                        url: url.clone(),
                        header_allowlist: server.spec.headers.keys().cloned().collect(),
                        tool_allowlist: server.spec.tool_allowlist.clone(),
                    }),
                    ToolServerTransport::Sse { url } => sse_tools.push(SseToolSection {
                        name: tool.tool_name().to_string(),
                        url: url.clone(),
                        header_allowlist: server.spec.headers.keys().cloned().collect(),
                        tool_allowlist: server.spec.tool_allowlist.clone(),
                    }),
                    ToolServerTransport::Stdio { .. } => {
                        // stdio servers are launched by the runtime directly;
                        // they don't get a network endpoint in AgentConfig.
                    }
                }
            }

            let memory = match &d.memory {
                Some(mem_name) => {
                    let mem_ref = ResourceRef::parse(ResourceKind::Memory, mem_name, ns);
                    let mem = resources
                        .get_memory(&mem_ref.namespace, &mem_ref.name)
                        .ok_or_else(|| ControllerError::MissingReference {
                            reference: mem_ref.clone(),
                        })?;
                    Some(translate_memory(mem, resources, ns)?)
                }
                None => None,
            };

            Ok(AgentConfig {
                name: runtime_agent_name,
                model: Some(model),
                http_tools,
                sse_tools,
                remote_agents: Vec::new(),
                memory,
                workflow: None,
                stream: d.stream,
                context_config: None,
                resumability_config: None,
            })
        }
        AgentSpec::Workflow(w) => {
            let mut remote_agents = Vec::new();
            for sub in w.pattern.sub_agents() {
                let sub_ref = ResourceRef::parse(ResourceKind::Agent, sub, ns);
                if resources.get_agent(&sub_ref.namespace, &sub_ref.name).is_none() {
                    return Err(ControllerError::MissingReference { reference: sub_ref });
                }
                remote_agents.push(remote_agent_section(&sub_ref));
            }

            let runtime_sub_agents = |names: &[String]| {
                names.iter().map(|n| runtime_name(n)).collect::<Vec<_>>()
            };

            let workflow = if w.pattern.sequential.is_some() {
                WorkflowSection::Sequential {
                    sub_agents: runtime_sub_agents(w.pattern.sub_agents()),
                }
            } else if let Some(p) = &w.pattern.parallel {
                WorkflowSection::Parallel {
                    sub_agents: runtime_sub_agents(&p.sub_agents),
                    max_workers: p.max_workers,
                }
            } else if let Some(l) = &w.pattern.looped {
                WorkflowSection::Loop {
                    sub_agents: runtime_sub_agents(&l.sub_agents),
                    max_iterations: l.max_iterations,
                }
            } else {
                return Err(ControllerError::WorkflowCardinality {
                    reference: agent.resource_ref(ResourceKind::Agent),
                    detail: "no pattern set".into(),
                });
            };

            Ok(AgentConfig {
                name: runtime_agent_name,
                model: None,
                http_tools: Vec::new(),
                sse_tools: Vec::new(),
                remote_agents,
                memory: None,
                workflow: Some(workflow),
                stream: w.stream,
                context_config: None,
                resumability_config: None,
            })
        }
        AgentSpec::Byo(_) => Ok(AgentConfig {
            name: runtime_agent_name,
            model: None,
            http_tools: Vec::new(),
            sse_tools: Vec::new(),
            remote_agents: Vec::new(),
            memory: None,
            workflow: None,
            stream: false,
            context_config: None,
            resumability_config: None,
        }),
    }
}

fn remote_agent_section(reference: &ResourceRef) -> RemoteAgentSection {
    let name = runtime_name(&reference.name);
    let namespace = runtime_name(&reference.namespace);
    RemoteAgentSection {
        name: name.clone(),
        url: format!("http://{name}.{namespace}:{DEFAULT_AGENT_PORT}"),
    }
}

fn translate_memory(
    mem: &agentmesh_core::Memory,
    resources: &ResourceManager,
    ns: &str,
) -> ControllerResult<MemorySection> {
    let provider = match mem.spec.backend {
        MemoryBackendKind::InProcess => "in-process",
        MemoryBackendKind::VectorService => "vector-service",
    };

    let embedding = match &mem.spec.embedding_model {
        Some(model_name) => {
            let model_ref = ResourceRef::parse(ResourceKind::ModelConfig, model_name, ns);
            let model = resources
                .get_model_config(&model_ref.namespace, &model_ref.name)
                .ok_or_else(|| ControllerError::MissingReference {
                    reference: model_ref.clone(),
                })?;
            Some(EmbeddingSection {
                provider: model.spec.provider.clone(),
                model: model.spec.model.clone(),
            })
        }
        None => None,
    };

    Ok(MemorySection {
        provider: provider.to_string(),
        embedding,
        ttl_seconds: mem.spec.ttl_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::{
        AcceptedStatus, DeclarativeAgentSpec, DeploymentHints, ModelConfig, ModelConfigSpec,
        ObjectMeta, Registry, ToolServer, ToolServerSpec, ToolServerTransport,
    };

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.into(),
            namespace: Some("default".into()),
            generation: 3,
            ..Default::default()
        }
    }

    fn model_config(name: &str) -> ModelConfig {
        ModelConfig {
            api_version: "agentmesh.dev/v1alpha1".into(),
            kind: "ModelConfig".into(),
            metadata: meta(name),
            spec: ModelConfigSpec {
                provider: "openai".into(),
                model: "gpt-4".into(),
                api_key_secret: "s1".into(),
                base_url: None,
                temperature: Some(0.5),
                max_tokens: None,
                region: None,
                tls: None,
                extra: Default::default(),
            },
            status: AcceptedStatus::default(),
        }
    }

    fn declarative_agent(name: &str, model_config: &str) -> Agent {
        Agent {
            api_version: "agentmesh.dev/v1alpha1".into(),
            kind: "Agent".into(),
            metadata: meta(name),
            spec: AgentSpec::Declarative(DeclarativeAgentSpec {
                instruction: "help".into(),
                model_config: model_config.into(),
                tools: vec![],
                memory: None,
                deployment: DeploymentHints::default(),
                tls: None,
                stream: true,
            }),
            status: AcceptedStatus::default(),
        }
    }

    #[test]
    fn missing_model_config_yields_typed_error_not_partial_config() {
        let resources = ResourceManager::new();
        let agent = declarative_agent("my-agent", "gpt4");
        let err = translate(&agent, &resources).unwrap_err();
        assert!(matches!(err, ControllerError::MissingReference { .. }));
    }

    #[test]
    fn declarative_agent_translates_model_section() {
        let mut resources = ResourceManager::new();
        resources.model_configs.register(model_config("gpt4")).unwrap();
        let agent = declarative_agent("my-agent", "gpt4");

        let config = translate(&agent, &resources).unwrap();
        let model = config.model.unwrap();
        assert_eq!(model.provider, "openai");
        assert_eq!(model.model, "gpt-4");
        assert!(config.stream);
    }

    #[test]
    fn translation_is_deterministic_for_identical_closures() {
        let mut resources = ResourceManager::new();
        resources.model_configs.register(model_config("gpt4")).unwrap();
        let agent = declarative_agent("my-agent", "gpt4");

        let a = translate(&agent, &resources).unwrap();
        let b = translate(&agent, &resources).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn http_tool_resolves_to_endpoint_section() {
        let mut resources = ResourceManager::new();
        resources.model_configs.register(model_config("gpt4")).unwrap();
        resources
            .tool_servers
            .register(ToolServer {
                api_version: "agentmesh.dev/v1alpha1".into(),
                kind: "ToolServer".into(),
                metadata: meta("filesystem"),
                spec: ToolServerSpec {
                    transport: ToolServerTransport::Http {
                        url: "http://filesystem.default:9000".into(),
                    },
                    headers: Default::default(),
                    timeout_secs: 30,
                    tool_allowlist: vec!["read_file".into()],
                },
                status: AcceptedStatus::default(),
            })
            .unwrap();

        let mut agent = declarative_agent("my-agent", "gpt4");
        if let AgentSpec::Declarative(d) = &mut agent.spec {
            d.tools.push(agentmesh_core::ToolRef::Named("filesystem/read_file".into()));
        }

        let config = translate(&agent, &resources).unwrap();
        assert_eq!(config.http_tools.len(), 1);
        assert_eq!(config.http_tools[0].name, "read_file");
    }
}
