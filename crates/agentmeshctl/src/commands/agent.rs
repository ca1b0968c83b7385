//! `agentmeshctl agent run`: starts the per-agent HTTP runtime for a given
//! AgentConfig document, or an Agent resource translated against a
//! manifest tree (§6).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentmesh_core::{AgentConfig, Registry, ResourceManager};
use agentmesh_runtime::model::{LlmModelClient, ModelClient};
use agentmesh_runtime::pipeline::PipelineConfig;
use agentmesh_runtime::session::{FileSessionStore, InMemorySessionStore, SessionStore};
use agentmesh_runtime::tools::{McpToolClient, ToolClient};
use agentmesh_runtime::{router, RuntimeState};
use anyhow::Context;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Start the runtime's HTTP surface for one agent.
    Run {
        /// Path to a generated AgentConfig document (JSON or YAML). Mutually
        /// exclusive with `--agent`.
        #[arg(long, conflicts_with = "agent")]
        config: Option<PathBuf>,

        /// Path to an Agent resource manifest; translated against
        /// `--manifest-root` into an AgentConfig. Mutually exclusive with
        /// `--config`.
        #[arg(long, conflicts_with = "config")]
        agent: Option<PathBuf>,

        /// Manifest directory to resolve `--agent`'s references against.
        #[arg(long, default_value = "manifests")]
        manifest_root: PathBuf,

        /// Address to bind the HTTP surface to.
        #[arg(long, env = "AGENTMESH_BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        /// Base URL advertised in the agent card and in remote-agent
        /// endpoint resolution (§6).
        #[arg(long, env = "AGENTMESH_BASE_URL")]
        base_url: Option<String>,

        /// Namespace override used for session app-name construction (§6,
        /// §4.10's `<namespace>__NS__<agent-name>` convention).
        #[arg(long, env = "AGENTMESH_NAMESPACE")]
        namespace: Option<String>,

        /// Global user id attributed to inbound messages that don't carry
        /// their own identity (§6, §9's delegated-authentication note).
        #[arg(long, env = "AGENTMESH_USER_ID", default_value = "default")]
        user_id: String,

        /// API key for the configured model provider.
        #[arg(long, env = "AGENTMESH_MODEL_API_KEY")]
        api_key: Option<String>,

        /// Session store backend.
        #[arg(long, value_enum, default_value = "memory")]
        session_store: SessionStoreKind,

        /// File path for the file-backed session store.
        #[arg(long, default_value = "sessions.json")]
        session_store_path: PathBuf,

        /// Tool names that should be treated as long-running (§4.7).
        #[arg(long = "long-running-tool")]
        long_running_tools: Vec<String>,

        /// Function name that, when called, transitions a task to
        /// `auth-required` (§4.7 step 4).
        #[arg(long)]
        auth_request_function: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SessionStoreKind {
    Memory,
    File,
}

pub async fn execute(command: AgentCommands) -> anyhow::Result<()> {
    match command {
        AgentCommands::Run {
            config,
            agent,
            manifest_root,
            bind,
            base_url,
            namespace,
            user_id,
            api_key,
            session_store,
            session_store_path,
            long_running_tools,
            auth_request_function,
        } => {
            run(
                config,
                agent,
                &manifest_root,
                bind,
                base_url,
                namespace,
                user_id,
                api_key,
                session_store,
                session_store_path,
                long_running_tools,
                auth_request_function,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config_path: Option<PathBuf>,
    agent_path: Option<PathBuf>,
    manifest_root: &Path,
    bind: SocketAddr,
    base_url: Option<String>,
    namespace: Option<String>,
    user_id: String,
    api_key: Option<String>,
    session_store: SessionStoreKind,
    session_store_path: PathBuf,
    long_running_tools: Vec<String>,
    auth_request_function: Option<String>,
) -> anyhow::Result<()> {
    let config = load_agent_config(config_path, agent_path, manifest_root)?;
    let base_url = base_url.unwrap_or_else(|| format!("http://{bind}"));

    let model: Arc<dyn ModelClient> = match &config.model {
        Some(section) => {
            let inner = agentmesh_llm::LlmClient::from_model_section(section, api_key.as_deref())
                .context("failed to build model client from AgentConfig's model section")?;
            Arc::new(
                LlmModelClient::new(inner, section.model.clone())
                    .with_temperature(section.temperature)
                    .with_max_tokens(section.max_tokens),
            )
        }
        None => anyhow::bail!("AgentConfig has no model section; workflow/BYO agents are not served by `agent run`"),
    };

    let tools: Arc<dyn ToolClient> = Arc::new(
        McpToolClient::from_agent_config(&config, long_running_tools)
            .await
            .context("failed to connect to the agent's configured tool endpoints")?,
    );

    let sessions: Arc<dyn SessionStore> = match session_store {
        SessionStoreKind::Memory => Arc::new(InMemorySessionStore::new()),
        SessionStoreKind::File => Arc::new(
            FileSessionStore::new(session_store_path)
                .await
                .context("failed to open the file-backed session store")?,
        ),
    };

    let pipeline_config = PipelineConfig {
        auth_request_function: auth_request_function.unwrap_or_default(),
        ..PipelineConfig::default()
    };

    let state = Arc::new(RuntimeState {
        config,
        base_url,
        namespace,
        user_id,
        model,
        tools,
        sessions,
        pipeline_config,
        http_client: reqwest::Client::new(),
    });

    let app = router(state);
    tracing::info!(%bind, "starting agent runtime");
    println!("agent runtime listening on http://{bind}");
    println!("press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(bind).await.context("failed to bind runtime listener")?;
    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        println!("shutdown signal received, stopping runtime...");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await.context("runtime server error")?;

    println!("agent runtime stopped gracefully");
    Ok(())
}

fn load_agent_config(config_path: Option<PathBuf>, agent_path: Option<PathBuf>, manifest_root: &Path) -> anyhow::Result<AgentConfig> {
    if let Some(path) = config_path {
        return load_yaml_or_json(&path);
    }

    let agent_path = agent_path.context("one of --config or --agent is required")?;
    let agent: agentmesh_core::Agent = load_yaml_or_json(&agent_path)?;

    let mut resources = ResourceManager::new();
    resources
        .load_directory_tree(manifest_root)
        .with_context(|| format!("failed to load manifest tree at {}", manifest_root.display()))?;
    resources.agents.register(agent.clone()).context("failed to register the agent under validation")?;

    if let agentmesh_core::AgentSpec::Workflow(w) = &agent.spec {
        let ns = agent.metadata.namespace_or_default();
        let key = agent.resource_ref(agentmesh_core::ResourceKind::Agent);
        agentmesh_controller::validator::validate_cardinality(&key, &w.pattern)?;
        agentmesh_controller::validator::validate_references(&key, &w.pattern, &resources, ns)?;
        agentmesh_controller::validator::detect_cycles(&resources)?;
    }

    agentmesh_controller::translator::translate(&agent, &resources).context("failed to translate agent into an AgentConfig")
}

fn load_yaml_or_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content).with_context(|| format!("failed to parse {} as JSON", path.display()))
    } else {
        let de = serde_yaml::Deserializer::from_str(&content);
        serde_path_to_error::deserialize(de).with_context(|| format!("failed to parse {} as YAML", path.display()))
    }
}
