//! `assert_cmd` coverage for `agentmeshctl validate -f <file>` (§8).

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("modelconfigs")).unwrap();
    let mut model_file = std::fs::File::create(dir.join("modelconfigs/gpt.yaml")).unwrap();
    writeln!(
        model_file,
        r#"
apiVersion: agentmesh.dev/v1alpha1
kind: ModelConfig
metadata:
  name: gpt
  namespace: default
spec:
  provider: openai
  model: gpt-4
  apiKeySecret: default/openai-key
"#
    )
    .unwrap();

    let agent_path = dir.join("billing-bot.yaml");
    let mut agent_file = std::fs::File::create(&agent_path).unwrap();
    writeln!(
        agent_file,
        r#"
apiVersion: agentmesh.dev/v1alpha1
kind: Agent
metadata:
  name: billing-bot
  namespace: default
spec:
  type: declarative
  instruction: "You are a billing assistant."
  modelConfig: default/gpt
"#
    )
    .unwrap();
    agent_path
}

#[test]
fn validate_prints_the_generated_agent_config() {
    let dir = tempfile::tempdir().unwrap();
    let agent_path = write_fixture(dir.path());

    Command::cargo_bin("agentmeshctl")
        .unwrap()
        .args(["validate", "-f", agent_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("billing_bot"));
}

#[test]
fn validate_fails_on_a_missing_model_config_reference() {
    let dir = tempfile::tempdir().unwrap();
    let agent_path = dir.path().join("billing-bot.yaml");
    let mut agent_file = std::fs::File::create(&agent_path).unwrap();
    writeln!(
        agent_file,
        r#"
apiVersion: agentmesh.dev/v1alpha1
kind: Agent
metadata:
  name: billing-bot
  namespace: default
spec:
  type: declarative
  instruction: "You are a billing assistant."
  modelConfig: default/does-not-exist
"#
    )
    .unwrap();

    Command::cargo_bin("agentmeshctl")
        .unwrap()
        .args(["validate", "-f", agent_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}
