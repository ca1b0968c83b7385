use clap::{Parser, Subcommand};

use crate::commands;

/// agentmeshctl - CLI for the agentmesh declarative agent-orchestration platform.
#[derive(Parser, Debug)]
#[command(name = "agentmeshctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbose logging (sets the default tracing filter to `debug`; an
    /// explicit `RUST_LOG` still takes precedence, per §6).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the reconciliation controller against a manifest directory.
    Controller {
        #[command(subcommand)]
        command: commands::controller::ControllerCommands,
    },

    /// Run the per-agent HTTP runtime.
    Agent {
        #[command(subcommand)]
        command: commands::agent::AgentCommands,
    },

    /// Validate a manifest file without starting any server.
    Validate {
        /// Path to the Agent (or resource) manifest to validate.
        #[arg(short, long)]
        file: String,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: commands::completion::Shell,
    },
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Controller { command } => commands::controller::execute(command).await,
            Commands::Agent { command } => commands::agent::execute(command).await,
            Commands::Validate { file } => commands::validate::execute(&file).await,
            Commands::Completions { shell } => commands::completion::execute(shell),
        }
    }
}
