//! The `graph` command: inspect the component DAG without building.

use anyhow::Result;
use clap::Args;
use std::path::Path;

use crate::graph::ComponentGraph;
use crate::manifest::Manifest;

#[derive(Args)]
pub struct GraphCommand {}

impl GraphCommand {
    pub fn execute(self, manifest_path: &Path) -> Result<()> {
        let manifest = Manifest::load(manifest_path)?;
        let graph = ComponentGraph::build(manifest.components)?;

        if graph.is_empty() {
            println!("no components defined");
            return Ok(());
        }

        for (depth, level) in graph.levels().enumerate() {
            let ids: Vec<&str> = level.iter().map(|spec| spec.id.as_str()).collect();
            println!("level {depth}: {}", ids.join(", "));
        }
        println!(
            "\n{} component(s) across {} level(s)",
            graph.len(),
            graph.level_count()
        );
        Ok(())
    }
}
