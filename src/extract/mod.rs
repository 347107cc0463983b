//! Interface extraction: reducing a generated artifact to its public surface.
//!
//! Two variants, selected by the component's target language:
//!
//! - **Self-describing** (Python): the source is already the smallest
//!   faithful interface; the artifact is taken verbatim.
//! - **Structural strip + semantic augmentation** (Java): a compiler-produced
//!   interface binary is decompiled into a signature skeleton, then a
//!   synthesis pass re-describes intended usage in prose — compilation erased
//!   parameter names and intent, and dependents must be able to use the
//!   component without seeing its implementation. Synthesis failure is
//!   non-fatal: the bare skeleton still works as context, just with less
//!   semantic richness. Decompilation failure is fatal; there is nothing to
//!   fall back to.

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::artifact::{GeneratedArtifact, InterfaceArtifact};
use crate::backend::Backend;
use crate::manifest::{ComponentSpec, ToolchainConfig};

mod decompiler;

pub use decompiler::{DecompilerCommand, interface_binary_path};

/// Failures on the structural-strip path.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("symbol '{symbol}' not found in {binary}: {detail}")]
    SymbolNotFound {
        symbol: String,
        binary: PathBuf,
        detail: String,
    },

    #[error("compiled interface binary missing: {path}")]
    InterfaceBinaryMissing { path: PathBuf },

    #[error("decompiler failed for '{symbol}': {reason}")]
    DecompilerFailed { symbol: String, reason: String },

    #[error("no decompiler configured in [toolchain] for a compiled target")]
    ToolchainUnconfigured,

    #[error("no interface_dir configured in [toolchain] for a compiled target")]
    InterfaceDirUnconfigured,
}

/// Produce the interface artifact for a freshly generated component.
pub async fn extract(
    artifact: &GeneratedArtifact,
    spec: &ComponentSpec,
    backend: &Backend,
    toolchain: &ToolchainConfig,
) -> Result<InterfaceArtifact, ExtractionError> {
    if spec.language.is_self_describing() {
        debug!(component = %spec.id, "self-describing target; interface is the source");
        return Ok(InterfaceArtifact::verbatim(&spec.id, &artifact.source));
    }

    let interface_dir = toolchain
        .interface_dir
        .as_deref()
        .ok_or(ExtractionError::InterfaceDirUnconfigured)?;
    let binary = interface_binary_path(interface_dir, &spec.id);
    let symbol = spec.qualified_symbol();

    let command =
        DecompilerCommand::new(toolchain.decompiler.clone(), toolchain.decompile_timeout_secs)?;
    let skeleton = command.decompile(&binary, &symbol).await?;

    // Semantic augmentation is best-effort; a degraded interface beats a
    // failed node.
    match backend.describe_usage(&spec.id, &artifact.source, &skeleton).await {
        Ok(usage) => {
            debug!(component = %spec.id, "usage synthesis succeeded");
            Ok(InterfaceArtifact::verbatim(
                &spec.id,
                format!("{}{skeleton}", doc_block(&usage)),
            ))
        }
        Err(error) => {
            warn!(component = %spec.id, %error, "usage synthesis failed; falling back to bare skeleton");
            Ok(InterfaceArtifact::degraded(&spec.id, &skeleton))
        }
    }
}

/// Format a synthesized usage description as a leading doc comment.
///
/// `*/` sequences inside the prose are escaped so they cannot terminate the
/// block early.
fn doc_block(usage: &str) -> String {
    let escaped = usage.replace("*/", "* /");
    let body = escaped.replace('\n', "\n* ");
    format!("/**\n* {body}\n*/\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{DEGRADED_MARKER, InterfaceFidelity};
    use crate::backend::FixtureBackend;
    use crate::manifest::{BackendParams, TargetKind, TargetLanguage};

    fn spec(id: &str, language: TargetLanguage) -> ComponentSpec {
        ComponentSpec {
            id: id.to_string(),
            description: "desc".to_string(),
            language,
            kind: TargetKind::Library,
            module: "com.example".to_string(),
            dependencies: vec![],
            docs: vec![],
            resources: vec![],
            params: BackendParams {
                model: "m".to_string(),
                temperature: 0.2,
                max_output_tokens: 256,
            },
        }
    }

    fn artifact(id: &str, source: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            component_id: id.to_string(),
            source: source.to_string(),
            spec_digest: "sha256:0".to_string(),
            dep_interface_digests: vec![],
        }
    }

    #[tokio::test]
    async fn self_describing_interface_is_verbatim() {
        let backend = Backend::Fixture(FixtureBackend::new());
        let spec = spec("util", TargetLanguage::Python);
        let artifact = artifact("util", "def helper(x: int) -> int:\n    return x\n");
        let iface =
            extract(&artifact, &spec, &backend, &ToolchainConfig::default()).await.unwrap();
        assert_eq!(iface.text, artifact.source);
        assert_eq!(iface.fidelity, InterfaceFidelity::Full);
    }

    #[tokio::test]
    async fn compiled_target_without_toolchain_fails() {
        let backend = Backend::Fixture(FixtureBackend::new());
        let spec = spec("util", TargetLanguage::Java);
        let artifact = artifact("util", "public class Util {}");
        let err = extract(&artifact, &spec, &backend, &ToolchainConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InterfaceDirUnconfigured));
    }

    #[test]
    fn doc_block_escapes_terminators() {
        let block = doc_block("uses a */ sequence\nsecond line");
        assert!(block.starts_with("/**\n* "));
        assert!(block.ends_with("*/\n"));
        assert!(!block[3..block.len() - 3].contains("*/"));
        assert!(block.contains("\n* second line"));
    }

    #[test]
    fn degraded_marker_is_visible_to_consumers() {
        let iface = InterfaceArtifact::degraded("x", "class X {}");
        assert!(iface.text.contains(DEGRADED_MARKER));
    }
}
