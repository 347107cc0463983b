//! Shared helpers for integration tests.

use codeweave::backend::{Backend, FixtureBackend};
use codeweave::cache::ArtifactStore;
use codeweave::graph::ComponentGraph;
use codeweave::manifest::{
    BackendParams, ComponentSpec, TargetKind, TargetLanguage, ToolchainConfig,
};
use codeweave::orchestrator::{BuildOptions, BuildReport, Orchestrator};

/// A Python library component with the given dependencies.
pub fn spec(id: &str, deps: &[&str]) -> ComponentSpec {
    spec_with_description(id, &format!("component {id}"), deps)
}

pub fn spec_with_description(id: &str, description: &str, deps: &[&str]) -> ComponentSpec {
    ComponentSpec {
        id: id.to_string(),
        description: description.to_string(),
        language: TargetLanguage::Python,
        kind: TargetKind::Library,
        module: format!("pkg.{id}"),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        docs: vec![],
        resources: vec![],
        params: BackendParams {
            model: "fixture".to_string(),
            temperature: 0.2,
            max_output_tokens: 1024,
        },
    }
}

pub fn graph(specs: Vec<ComponentSpec>) -> ComponentGraph {
    ComponentGraph::build(specs).expect("valid test graph")
}

/// Run a build with a fresh fixture backend, returning the report and the
/// number of generation calls the backend saw.
pub async fn run_build(
    fixture: FixtureBackend,
    store: &dyn ArtifactStore,
    graph: &ComponentGraph,
    options: BuildOptions,
) -> (BuildReport, usize) {
    let backend = Backend::Fixture(fixture);
    let toolchain = ToolchainConfig::default();
    let report = Orchestrator::new(&backend, store, &toolchain, options).run(graph).await;
    let Backend::Fixture(fixture) = &backend else { unreachable!() };
    (report, fixture.generation_calls())
}
