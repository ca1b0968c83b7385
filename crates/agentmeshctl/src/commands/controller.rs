//! `agentmeshctl controller run`: starts the reconciliation core against a
//! manifest directory (§4, §6).

use std::path::PathBuf;
use std::time::Duration;

use agentmesh_controller::{Controller, ControllerConfig};
use agentmesh_controller::scheduler::SchedulerConfig;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum ControllerCommands {
    /// Start the controller's reconcile loop.
    Run {
        /// Directory containing `agents/`, `modelconfigs/`, `toolservers/`,
        /// `memories/`, `teams/` manifest subdirectories.
        #[arg(long, default_value = "manifests")]
        manifest_root: PathBuf,

        /// How often the filesystem watcher polls for changes, in
        /// milliseconds.
        #[arg(long, default_value_t = 2000)]
        poll_interval_ms: u64,

        /// Number of reconcile workers.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Comma-separated RFC-1123 namespace labels to watch; empty means
        /// all namespaces (§6).
        #[arg(long, env = "AGENTMESH_NAMESPACES", default_value = "")]
        namespaces: String,
    },
}

pub async fn execute(command: ControllerCommands) -> anyhow::Result<()> {
    match command {
        ControllerCommands::Run {
            manifest_root,
            poll_interval_ms,
            workers,
            namespaces,
        } => run(manifest_root, poll_interval_ms, workers, &namespaces).await,
    }
}

async fn run(manifest_root: PathBuf, poll_interval_ms: u64, workers: usize, namespaces: &str) -> anyhow::Result<()> {
    let watched = parse_namespaces(namespaces);
    if !watched.is_empty() {
        tracing::info!(?watched, "restricting reconciliation to configured namespaces");
    }

    let config = ControllerConfig {
        manifest_root: manifest_root.clone(),
        poll_interval: Duration::from_millis(poll_interval_ms),
        scheduler: SchedulerConfig { workers, ..SchedulerConfig::default() },
    };

    tracing::info!(root = %manifest_root.display(), "starting controller");
    let controller = Controller::start(config).await?;

    println!("controller running against {}", manifest_root.display());
    println!("press Ctrl+C to stop");

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        println!("shutdown signal received, stopping controller...");
    };
    shutdown_signal.await;

    controller.shutdown().await;
    println!("controller stopped gracefully");
    Ok(())
}

/// Unknown/invalid namespace tokens are logged and ignored, not rejected
/// (§6).
fn parse_namespaces(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if !is_rfc1123_label(s) {
                tracing::warn!(namespace = %s, "ignoring invalid namespace token");
            }
            s.to_string()
        })
        .filter(|s| is_rfc1123_label(s))
        .collect()
}

fn is_rfc1123_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_filters_namespace_list() {
        let namespaces = parse_namespaces("default, billing,Invalid_NS,-bad,");
        assert_eq!(namespaces, vec!["default".to_string(), "billing".to_string()]);
    }

    #[test]
    fn empty_string_means_watch_all_namespaces() {
        assert!(parse_namespaces("").is_empty());
    }
}
