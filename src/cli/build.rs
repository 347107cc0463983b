//! The `build` command: run the full generation pipeline.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;

use crate::backend::{Backend, FixtureBackend, HttpBackend};
use crate::cache::FsStore;
use crate::graph::ComponentGraph;
use crate::manifest::{Manifest, TargetLanguage};
use crate::orchestrator::{BuildOptions, BuildReport, NodeStatus, Orchestrator};

#[derive(Args)]
pub struct BuildCommand {
    /// Use the deterministic offline backend instead of the network.
    #[arg(long)]
    offline: bool,

    /// Maximum simultaneous backend invocations.
    #[arg(long, value_name = "N")]
    max_parallel: Option<usize>,

    /// Stop scheduling new nodes after the first failure.
    #[arg(long)]
    fail_fast: bool,

    /// Retries for transient backend failures.
    #[arg(long, default_value_t = 3)]
    max_retries: usize,
}

impl BuildCommand {
    pub async fn execute(self, manifest_path: &Path) -> Result<()> {
        let manifest = Manifest::load(manifest_path)?;
        let graph = ComponentGraph::build(manifest.components.clone())?;

        let backend = if self.offline {
            Backend::Fixture(FixtureBackend::new())
        } else {
            Backend::Http(HttpBackend::from_config(&manifest.backend)?)
        };

        let cache_root = match &manifest.project.cache_dir {
            Some(dir) => manifest.base_dir.join(dir),
            None => FsStore::default_root()?,
        };
        let store = FsStore::open(cache_root)?;

        let mut options = BuildOptions {
            fail_fast: self.fail_fast,
            max_retries: self.max_retries,
            ..Default::default()
        };
        if let Some(n) = self.max_parallel {
            options.concurrency = n;
        }

        let orchestrator = Orchestrator::new(&backend, &store, &manifest.toolchain, options);
        let report = orchestrator.run(&graph).await;

        print_report(&report);
        write_outputs(&manifest, &graph, &report)?;

        let failed = report.nodes.iter().filter(|n| !n.status.succeeded()).count();
        if failed > 0 {
            anyhow::bail!("build finished with {failed} unbuilt component(s)");
        }
        println!(
            "\n{} {} built, {} cached",
            "done:".green().bold(),
            report.built_count(),
            report.cached_count()
        );
        Ok(())
    }
}

fn print_report(report: &BuildReport) {
    for node in &report.nodes {
        match &node.status {
            NodeStatus::Cached => println!("  {} {}", "cached".cyan(), node.id),
            NodeStatus::Built => println!("   {} {}", "built".green(), node.id),
            NodeStatus::Failed { reason } => {
                println!("  {} {} ({reason})", "failed".red().bold(), node.id);
            }
            NodeStatus::Skipped { blocked_by } => {
                println!(" {} {} (blocked by: {blocked_by})", "skipped".yellow(), node.id);
            }
        }
    }
}

/// Write generated sources and interfaces for every successful node.
///
/// Sources land in `out_dir`, interfaces under `out_dir/interfaces`, both
/// consumable by the surrounding build layer as ordinary files.
fn write_outputs(manifest: &Manifest, graph: &ComponentGraph, report: &BuildReport) -> Result<()> {
    let out_dir = manifest.base_dir.join(&manifest.project.out_dir);
    let iface_dir = out_dir.join("interfaces");
    std::fs::create_dir_all(&iface_dir)
        .with_context(|| format!("cannot create output directory {}", out_dir.display()))?;

    for node in &report.nodes {
        let Some(entry) = &node.entry else { continue };
        let Some(spec) = graph.get(&node.id) else { continue };

        let source_path = out_dir.join(spec.output_file_name());
        let mut source = String::new();
        if spec.language == TargetLanguage::Python {
            // Import-usage header, so consumers know the module path without
            // reading the manifest.
            source.push_str(&format!(
                "# Usage: import from this package using:\n# from {} import <name>\n\n",
                spec.module
            ));
        }
        source.push_str(&entry.generated.source);
        std::fs::write(&source_path, source)
            .with_context(|| format!("cannot write {}", source_path.display()))?;

        let iface_path = iface_dir.join(format!("{}.txt", spec.id));
        std::fs::write(&iface_path, &entry.interface.text)
            .with_context(|| format!("cannot write {}", iface_path.display()))?;
    }
    Ok(())
}
