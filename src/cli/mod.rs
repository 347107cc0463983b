//! Command-line interface.
//!
//! Subcommands: `build` (run the generation pipeline), `graph` (inspect the
//! component DAG without building), and `cache` (manage the persistent
//! store). Global flags control verbosity and the manifest location.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod build;
mod cache;
mod graph;

pub use build::BuildCommand;
pub use cache::CacheCommand;
pub use graph::GraphCommand;

/// Runtime configuration derived from global CLI flags.
///
/// Separated from argument parsing so tests can inject a configuration
/// without building argv.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive; `None` silences logging entirely.
    pub log_level: Option<String>,
}

impl CliConfig {
    /// Install the tracing subscriber for this process.
    ///
    /// `RUST_LOG` wins over the flag-derived level when set. Safe to call
    /// more than once; later calls are no-ops.
    pub fn init_logging(&self) {
        let Some(level) = &self.log_level else {
            return;
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.clone()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[derive(Parser)]
#[command(
    name = "codeweave",
    about = "Generate source code from natural-language component specs, incrementally",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the manifest file (defaults to ./codeweave.toml).
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build all components, reusing cached results where possible
    Build(BuildCommand),
    /// Print the component graph as topological levels
    Graph(GraphCommand),
    /// Manage the persistent artifact cache
    Cache(CacheCommand),
}

impl Cli {
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };
        CliConfig { log_level }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let manifest_path = self
            .manifest_path
            .unwrap_or_else(|| PathBuf::from(crate::manifest::MANIFEST_NAME));

        match self.command {
            Commands::Build(cmd) => cmd.execute(&manifest_path).await,
            Commands::Graph(cmd) => cmd.execute(&manifest_path),
            Commands::Cache(cmd) => cmd.execute(&manifest_path),
        }
    }
}
