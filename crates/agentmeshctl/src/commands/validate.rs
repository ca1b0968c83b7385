//! `agentmeshctl validate -f <file>`: runs the Workflow Validator and
//! Translator against a manifest without starting any server, printing the
//! resulting AgentConfig or the validation error (§6, §8's `assert_cmd`
//! coverage expectation).

use std::path::{Path, PathBuf};

use agentmesh_core::{Agent, AgentSpec, Registry, ResourceKind, ResourceManager};
use agentmesh_controller::{translator, validator};
use anyhow::Context;

pub async fn execute(file: &str) -> anyhow::Result<()> {
    let path = PathBuf::from(file);
    let agent = load_agent(&path)?;

    let mut resources = infer_resource_manager(&path)?;
    resources.agents.register(agent.clone()).context("failed to register the agent under validation")?;

    if let AgentSpec::Workflow(w) = &agent.spec {
        let ns = agent.metadata.namespace_or_default();
        let key = agent.resource_ref(ResourceKind::Agent);
        validator::validate_cardinality(&key, &w.pattern)?;
        validator::validate_references(&key, &w.pattern, &resources, ns)?;
        validator::detect_cycles(&resources)?;
    }

    let config = translator::translate(&agent, &resources)?;
    let rendered = serde_yaml::to_string(&config).context("failed to render the generated AgentConfig as YAML")?;
    print!("{rendered}");
    Ok(())
}

fn load_agent(path: &Path) -> anyhow::Result<Agent> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let de = serde_yaml::Deserializer::from_str(&content);
    serde_path_to_error::deserialize(de).with_context(|| format!("failed to parse {} as an Agent manifest", path.display()))
}

/// Builds the closure the validator/translator resolve references against.
/// If `path` sits inside a conventional `agents/` subdirectory, its parent's
/// parent is treated as the manifest root; otherwise the manifest root is
/// the file's own directory (so a lone Agent manifest with no references
/// still validates).
fn infer_resource_manager(path: &Path) -> anyhow::Result<ResourceManager> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let root = if dir.file_name().map(|n| n == "agents").unwrap_or(false) {
        dir.parent().unwrap_or(dir)
    } else {
        dir
    };

    let mut resources = ResourceManager::new();
    resources
        .load_directory_tree(root)
        .with_context(|| format!("failed to load manifest tree at {}", root.display()))?;
    Ok(resources)
}

// End-to-end coverage lives in `tests/validate.rs` (§8's `assert_cmd`
// expectation), exercising the built binary rather than this function
// directly.
