//! Build orchestration: scheduling, caching decisions, and failure routing.
//!
//! Per node the pipeline is key computation → cache probe → (on miss)
//! assemble → generate → validate/repair → extract → store. Nodes run level
//! by level: everything inside one topological level may run concurrently,
//! bounded by `concurrency`, and a node never starts before every dependency
//! has reached a terminal state.
//!
//! Failure routing: a failed node poisons exactly its transitive dependents,
//! which are reported `skipped(blocked-by)` without any backend invocation;
//! unrelated branches keep building. In-flight sibling generations are never
//! forcibly cancelled — an already-started external call is allowed to finish
//! and be cached.

use futures::{StreamExt, stream};
use std::collections::HashMap;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use crate::artifact::{GeneratedArtifact, InterfaceArtifact};
use crate::backend::Backend;
use crate::cache::{ArtifactStore, CacheEntry, ContentKey};
use crate::context::assemble;
use crate::extract::extract;
use crate::graph::ComponentGraph;
use crate::manifest::{ComponentSpec, ToolchainConfig};
use crate::validate::{run_syntax_check, validate_source};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum simultaneously in-flight backend invocations.
    pub concurrency: usize,
    /// Retries (beyond the first attempt) for transient backend failures.
    pub max_retries: usize,
    /// Regeneration attempts after a validation failure.
    pub max_repair_attempts: usize,
    /// Base delay for exponential retry backoff.
    pub retry_base_delay_ms: u64,
    /// Treat any node failure as build-fatal: nodes in later levels that have
    /// not started yet are skipped. In-flight work still completes.
    pub fail_fast: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            max_repair_attempts: 2,
            retry_base_delay_ms: 250,
            fail_fast: false,
        }
    }
}

/// Terminal state of one node within a build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Content key matched an existing entry; no backend invocation.
    Cached,
    /// Generated, extracted, and stored in this invocation.
    Built,
    Failed { reason: String },
    /// A transitive dependency failed; this node was never attempted.
    Skipped { blocked_by: String },
}

impl NodeStatus {
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Cached | Self::Built)
    }
}

/// Per-node build result.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub id: String,
    pub status: NodeStatus,
    /// Present for `Cached` and `Built` nodes.
    pub entry: Option<CacheEntry>,
}

/// Whole-build result, nodes in topological order.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub nodes: Vec<NodeReport>,
}

impl BuildReport {
    pub fn status_of(&self, id: &str) -> Option<&NodeStatus> {
        self.nodes.iter().find(|n| n.id == id).map(|n| &n.status)
    }

    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|n| n.status.succeeded())
    }

    pub fn built_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.status == NodeStatus::Built).count()
    }

    pub fn cached_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.status == NodeStatus::Cached).count()
    }
}

/// Outcome tracked while the build is in progress.
enum Outcome {
    Success { interface: InterfaceArtifact, entry: CacheEntry, cached: bool },
    Failed { reason: String },
    Skipped { blocked_by: String },
}

/// Dependency-aware incremental build driver.
///
/// The store and backend are injected; the orchestrator owns no global
/// state, and the cache is the only shared mutable resource.
pub struct Orchestrator<'a> {
    backend: &'a Backend,
    store: &'a dyn ArtifactStore,
    toolchain: &'a ToolchainConfig,
    options: BuildOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        backend: &'a Backend,
        store: &'a dyn ArtifactStore,
        toolchain: &'a ToolchainConfig,
        options: BuildOptions,
    ) -> Self {
        Self { backend, store, toolchain, options }
    }

    /// Build every component in `graph`, level by level.
    pub async fn run(&self, graph: &ComponentGraph) -> BuildReport {
        let mut outcomes: HashMap<String, Outcome> = HashMap::with_capacity(graph.len());
        let mut fatal: Option<String> = None;

        for level in graph.levels() {
            let mut ready = Vec::new();

            for spec in level {
                if let Some(blocker) = &fatal {
                    outcomes.insert(
                        spec.id.clone(),
                        Outcome::Skipped { blocked_by: blocker.clone() },
                    );
                    continue;
                }
                match self.blocking_dependency(spec, &outcomes) {
                    Some(blocked_by) => {
                        debug!(component = %spec.id, %blocked_by, "skipping: dependency failed");
                        outcomes.insert(spec.id.clone(), Outcome::Skipped { blocked_by });
                    }
                    None => {
                        let dep_interfaces: Vec<InterfaceArtifact> = spec
                            .dependencies
                            .iter()
                            .map(|dep| match &outcomes[dep] {
                                Outcome::Success { interface, .. } => interface.clone(),
                                _ => unreachable!("non-built dependency was not skipped"),
                            })
                            .collect();
                        ready.push((spec, dep_interfaces));
                    }
                }
            }

            // All ready nodes of this level run concurrently under the
            // backend bound; a node holds at most one backend call at a time.
            let results: Vec<(String, Outcome)> = stream::iter(ready)
                .map(|(spec, dep_interfaces)| async move {
                    (spec.id.clone(), self.build_node(spec, &dep_interfaces).await)
                })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;

            for (id, outcome) in results {
                if self.options.fail_fast
                    && fatal.is_none()
                    && matches!(outcome, Outcome::Failed { .. })
                {
                    fatal = Some(id.clone());
                }
                outcomes.insert(id, outcome);
            }
        }

        let nodes = graph
            .topological_order()
            .into_iter()
            .map(|spec| {
                let (status, entry) = match outcomes.remove(&spec.id) {
                    Some(Outcome::Success { entry, cached, .. }) => {
                        let status = if cached { NodeStatus::Cached } else { NodeStatus::Built };
                        (status, Some(entry))
                    }
                    Some(Outcome::Failed { reason }) => (NodeStatus::Failed { reason }, None),
                    Some(Outcome::Skipped { blocked_by }) => {
                        (NodeStatus::Skipped { blocked_by }, None)
                    }
                    None => (
                        NodeStatus::Failed { reason: "node was never scheduled".to_string() },
                        None,
                    ),
                };
                NodeReport { id: spec.id.clone(), status, entry }
            })
            .collect();

        BuildReport { nodes }
    }

    /// The nearest failed ancestor blocking `spec`, if any.
    fn blocking_dependency(
        &self,
        spec: &ComponentSpec,
        outcomes: &HashMap<String, Outcome>,
    ) -> Option<String> {
        for dep in &spec.dependencies {
            match outcomes.get(dep) {
                Some(Outcome::Failed { .. }) => return Some(dep.clone()),
                // Point at the original failure, not the intermediate skip.
                Some(Outcome::Skipped { blocked_by }) => return Some(blocked_by.clone()),
                _ => {}
            }
        }
        None
    }

    /// Run the full per-node pipeline. Terminal by construction: every error
    /// path folds into `Outcome::Failed`.
    async fn build_node(
        &self,
        spec: &ComponentSpec,
        dep_interfaces: &[InterfaceArtifact],
    ) -> Outcome {
        let dep_digests: Vec<String> =
            dep_interfaces.iter().map(InterfaceArtifact::digest).collect();

        let key = match ContentKey::compute(spec, &dep_digests) {
            Ok(key) => key,
            Err(e) => return Outcome::Failed { reason: e.to_string() },
        };
        debug!(component = %spec.id, %key, "content key computed");

        match self.store.get(&key) {
            Ok(Some(entry)) => {
                info!(component = %spec.id, "cache hit");
                return Outcome::Success { interface: entry.interface.clone(), entry, cached: true };
            }
            Ok(None) => {}
            Err(e) => {
                warn!(component = %spec.id, error = %e, "cache probe failed; rebuilding");
            }
        }

        let source = match self.generate_validated(spec, dep_interfaces).await {
            Ok(source) => source,
            Err(reason) => return Outcome::Failed { reason },
        };

        let spec_digest = match ContentKey::spec_digest(spec) {
            Ok(digest) => digest,
            Err(e) => return Outcome::Failed { reason: e.to_string() },
        };
        let generated = GeneratedArtifact {
            component_id: spec.id.clone(),
            source,
            spec_digest,
            dep_interface_digests: dep_digests,
        };

        debug!(component = %spec.id, "extracting interface");
        let interface = match extract(&generated, spec, self.backend, self.toolchain).await {
            Ok(interface) => interface,
            Err(e) => return Outcome::Failed { reason: e.to_string() },
        };

        let entry = CacheEntry::new(key, generated, interface.clone());
        if let Err(e) = self.store.put(&entry) {
            return Outcome::Failed { reason: format!("cannot store cache entry: {e}") };
        }
        info!(component = %spec.id, "built");
        Outcome::Success { interface, entry, cached: false }
    }

    /// Generate source and run it through validation, repairing a bounded
    /// number of times by re-invoking the backend with error feedback.
    async fn generate_validated(
        &self,
        spec: &ComponentSpec,
        dep_interfaces: &[InterfaceArtifact],
    ) -> Result<String, String> {
        let mut bundle = assemble(spec, dep_interfaces);
        let mut repairs = 0;

        loop {
            debug!(component = %spec.id, repairs, "generating");
            let source = self.generate_with_retry(spec, &bundle).await.map_err(|e| e.to_string())?;

            match self.validate(spec, &source).await {
                Ok(()) => return Ok(source),
                Err(reason) => {
                    if repairs >= self.options.max_repair_attempts {
                        return Err(format!(
                            "validation failed after {repairs} repair attempts: {reason}"
                        ));
                    }
                    warn!(component = %spec.id, %reason, "validation failed; requesting repair");
                    bundle = bundle.with_repair_feedback(&reason, &source);
                    repairs += 1;
                }
            }
        }
    }

    /// One logical generation call: transient failures retried with
    /// exponential backoff and jitter, everything else surfaced immediately.
    async fn generate_with_retry(
        &self,
        spec: &ComponentSpec,
        bundle: &crate::context::GenerationBundle,
    ) -> Result<String, crate::backend::GenerationError> {
        let strategy = ExponentialBackoff::from_millis(self.options.retry_base_delay_ms)
            .map(jitter)
            .take(self.options.max_retries);

        RetryIf::spawn(
            strategy,
            || self.backend.generate(bundle),
            |error: &crate::backend::GenerationError| {
                let retry = error.is_retryable();
                if retry {
                    warn!(component = %spec.id, %error, "transient backend failure; will retry");
                }
                retry
            },
        )
        .await
    }

    async fn validate(&self, spec: &ComponentSpec, source: &str) -> Result<(), String> {
        validate_source(source, spec).map_err(|e| e.to_string())?;

        if !self.toolchain.syntax_check.is_empty() {
            let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
            let file = dir.path().join(spec.output_file_name());
            std::fs::write(&file, source).map_err(|e| e.to_string())?;
            run_syntax_check(&self.toolchain.syntax_check, &file)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FixtureBackend, GenerationError};
    use crate::cache::MemoryStore;
    use crate::manifest::{BackendParams, TargetKind, TargetLanguage};

    fn spec(id: &str, deps: &[&str]) -> ComponentSpec {
        ComponentSpec {
            id: id.to_string(),
            description: format!("component {id}"),
            language: TargetLanguage::Python,
            kind: TargetKind::Library,
            module: format!("pkg.{id}"),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            docs: vec![],
            resources: vec![],
            params: BackendParams {
                model: "m".to_string(),
                temperature: 0.2,
                max_output_tokens: 512,
            },
        }
    }

    fn graph(specs: Vec<ComponentSpec>) -> ComponentGraph {
        ComponentGraph::build(specs).unwrap()
    }

    async fn run(
        backend: &Backend,
        store: &dyn ArtifactStore,
        graph: &ComponentGraph,
        options: BuildOptions,
    ) -> BuildReport {
        Orchestrator::new(backend, store, &ToolchainConfig::default(), options).run(graph).await
    }

    #[tokio::test]
    async fn builds_chain_in_order() {
        let backend = Backend::Fixture(FixtureBackend::new());
        let store = MemoryStore::new();
        let g = graph(vec![spec("b", &["a"]), spec("a", &[])]);
        let report = run(&backend, &store, &g, BuildOptions::default()).await;
        assert!(report.is_success());
        assert_eq!(report.built_count(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let fixture = FixtureBackend::new();
        fixture.fail_generation(
            "a",
            GenerationError::Transient { reason: "blip".to_string() },
            2,
        );
        let backend = Backend::Fixture(fixture);
        let store = MemoryStore::new();
        let g = graph(vec![spec("a", &[])]);
        let options = BuildOptions { retry_base_delay_ms: 1, ..Default::default() };
        let report = run(&backend, &store, &g, options).await;
        assert_eq!(report.status_of("a"), Some(&NodeStatus::Built));
    }

    #[tokio::test]
    async fn permanent_rejection_is_not_retried() {
        let fixture = FixtureBackend::new();
        fixture.fail_generation(
            "a",
            GenerationError::PermanentRejection { reason: "no".to_string() },
            1,
        );
        let backend = Backend::Fixture(fixture);
        let store = MemoryStore::new();
        let g = graph(vec![spec("a", &[])]);
        let report = run(&backend, &store, &g, BuildOptions::default()).await;
        assert!(matches!(report.status_of("a"), Some(NodeStatus::Failed { .. })));
        let Backend::Fixture(fixture) = &backend else { unreachable!() };
        assert_eq!(fixture.generation_calls(), 1);
    }

    #[tokio::test]
    async fn invalid_source_triggers_repair() {
        let fixture = FixtureBackend::new();
        fixture.emit_invalid_source("a", 1);
        let backend = Backend::Fixture(fixture);
        let store = MemoryStore::new();
        let g = graph(vec![spec("a", &[])]);
        let report = run(&backend, &store, &g, BuildOptions::default()).await;
        assert_eq!(report.status_of("a"), Some(&NodeStatus::Built));
        let Backend::Fixture(fixture) = &backend else { unreachable!() };
        assert_eq!(fixture.generation_calls(), 2);
    }

    #[tokio::test]
    async fn repair_budget_is_bounded() {
        let fixture = FixtureBackend::new();
        fixture.emit_invalid_source("a", 10);
        let backend = Backend::Fixture(fixture);
        let store = MemoryStore::new();
        let g = graph(vec![spec("a", &[])]);
        let options = BuildOptions { max_repair_attempts: 1, ..Default::default() };
        let report = run(&backend, &store, &g, options).await;
        assert!(matches!(report.status_of("a"), Some(NodeStatus::Failed { .. })));
        let Backend::Fixture(fixture) = &backend else { unreachable!() };
        assert_eq!(fixture.generation_calls(), 2);
    }

    #[tokio::test]
    async fn fail_fast_skips_later_levels() {
        let fixture = FixtureBackend::new();
        fixture.fail_generation(
            "a",
            GenerationError::PermanentRejection { reason: "no".to_string() },
            1,
        );
        let backend = Backend::Fixture(fixture);
        let store = MemoryStore::new();
        // y is independent of a but sits in a later level via dep on x.
        let g = graph(vec![spec("a", &[]), spec("x", &[]), spec("y", &["x"])]);
        let options = BuildOptions { fail_fast: true, ..Default::default() };
        let report = run(&backend, &store, &g, options).await;
        // x shares a's level: already started, allowed to finish.
        assert_eq!(report.status_of("x"), Some(&NodeStatus::Built));
        assert!(matches!(report.status_of("y"), Some(NodeStatus::Skipped { .. })));
    }
}
