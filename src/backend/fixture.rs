//! Deterministic offline backend.
//!
//! Produces stub sources derived purely from the bundle, so builds are
//! reproducible without network access. Used for `build --offline` dry runs
//! and as the test double for the orchestrator: it counts invocations,
//! tracks peak concurrency, and can inject scripted failures per component.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::GenerationError;
use crate::context::GenerationBundle;
use crate::manifest::{TargetKind, TargetLanguage};

/// Scripted behavior for one component.
#[derive(Debug, Clone)]
enum Script {
    /// Fail generation with this error for the first `remaining` attempts.
    Fail { error: GenerationError, remaining: usize },
    /// Emit source that fails validation for the first `remaining` attempts.
    EmitInvalid { remaining: usize },
    /// Fail usage synthesis for this component.
    FailUsage,
}

/// Offline generation backend with deterministic output.
#[derive(Debug, Default)]
pub struct FixtureBackend {
    scripts: DashMap<String, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each call open for `delay`, making concurrency observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail generation for `component_id` with `error`, `attempts` times.
    pub fn fail_generation(&self, component_id: &str, error: GenerationError, attempts: usize) {
        self.scripts
            .insert(component_id.to_string(), Script::Fail { error, remaining: attempts });
    }

    /// Emit invalid source for `component_id` for the first `attempts` calls.
    pub fn emit_invalid_source(&self, component_id: &str, attempts: usize) {
        self.scripts.insert(component_id.to_string(), Script::EmitInvalid { remaining: attempts });
    }

    /// Make usage synthesis fail for `component_id`.
    pub fn fail_usage_synthesis(&self, component_id: &str) {
        self.scripts.insert(component_id.to_string(), Script::FailUsage);
    }

    /// Total generation calls made (excludes usage synthesis).
    pub fn generation_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn generate(&self, bundle: &GenerationBundle) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _gauge = self.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.consume_script(&bundle.component_id) {
            Some(Script::Fail { error, .. }) => return Err(error),
            Some(Script::EmitInvalid { .. }) => return Ok(String::new()),
            _ => {}
        }
        Ok(render_stub(bundle))
    }

    pub async fn describe_usage(
        &self,
        component_id: &str,
        _source: &str,
        _skeleton: &str,
    ) -> Result<String, GenerationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if matches!(
            self.scripts.get(component_id).map(|s| s.clone()),
            Some(Script::FailUsage)
        ) {
            return Err(GenerationError::Transient {
                reason: "scripted usage-synthesis failure".to_string(),
            });
        }
        Ok(format!("Stub implementation of component '{component_id}'."))
    }

    /// Pop one use of the script for `component_id`, decrementing bounded
    /// failure counts. `FailUsage` scripts are left in place.
    fn consume_script(&self, component_id: &str) -> Option<Script> {
        let mut entry = self.scripts.get_mut(component_id)?;
        let current = entry.clone();
        match &mut *entry {
            Script::Fail { remaining, .. } | Script::EmitInvalid { remaining } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
            }
            Script::FailUsage => return None,
        }
        Some(current)
    }

    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { backend: self }
    }
}

struct InFlightGuard<'a> {
    backend: &'a FixtureBackend,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.backend.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Deterministic stub source for a bundle; valid under the structural checks
/// for its language and target kind.
fn render_stub(bundle: &GenerationBundle) -> String {
    // Fold the description into the stub so output changes whenever the
    // description does.
    let summary: String = bundle.description.lines().collect::<Vec<_>>().join(" ");
    match bundle.language {
        TargetLanguage::Python => {
            let mut out = format!(
                "\"\"\"{summary}\"\"\"\n\n\ndef run() -> None:\n    \"\"\"Entry point for {id}.\"\"\"\n    raise NotImplementedError(\"{id}\")\n",
                id = bundle.component_id,
            );
            if bundle.kind == TargetKind::Binary {
                out.push_str("\n\nif __name__ == \"__main__\":\n    run()\n");
            }
            out
        }
        TargetLanguage::Java => {
            let mut body = String::new();
            if bundle.kind == TargetKind::Binary {
                body.push_str(
                    "    public static void main(String[] args) {\n        throw new UnsupportedOperationException();\n    }\n",
                );
            }
            format!(
                "package {};\n\n/** {summary} */\npublic class {} {{\n{body}}}\n",
                bundle.module, bundle.type_name,
            )
        }
    }
}
