//! Derived build artifacts: generated sources and their public interfaces.
//!
//! Both artifact types are immutable once produced. A [`GeneratedArtifact`] is
//! the full source text for one component; an [`InterfaceArtifact`] is the
//! minimal public surface of that component, and is the only representation of
//! a dependency that downstream generation is ever allowed to see.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marker line prepended to an interface whose usage synthesis failed.
///
/// Consumers can tell a bare structural skeleton apart from a fully
/// augmented interface by the presence of this header.
pub const DEGRADED_MARKER: &str = "// NOTE: usage description unavailable; structural skeleton only";

/// Full generated source text for one component.
///
/// Tagged with the digest of the component spec that produced it and the
/// ordered interface digests of the dependencies that were in context, so an
/// artifact is always traceable to the exact inputs it was generated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// Id of the component this source was generated for.
    pub component_id: String,
    /// The generated source text.
    pub source: String,
    /// Digest of the component's own inputs (description, docs, params).
    pub spec_digest: String,
    /// Interface digests of the dependencies, in declared order.
    pub dep_interface_digests: Vec<String>,
}

/// How much semantic information an interface carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceFidelity {
    /// Structural skeleton plus a synthesized usage description.
    Full,
    /// Structural skeleton only; usage synthesis failed.
    Degraded,
}

/// Signature-level representation of a component's public surface.
///
/// For self-describing targets this is byte-identical to the generated
/// source. For compiled targets it is a decompiled skeleton with a
/// synthesized usage description attached as a leading doc block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceArtifact {
    /// Id of the component this interface describes.
    pub component_id: String,
    /// The interface text fed to dependents as context.
    pub text: String,
    pub fidelity: InterfaceFidelity,
}

impl InterfaceArtifact {
    /// Interface taken verbatim from the generated source (self-describing path).
    pub fn verbatim(component_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            text: source.into(),
            fidelity: InterfaceFidelity::Full,
        }
    }

    /// Bare skeleton fallback used when usage synthesis fails.
    pub fn degraded(component_id: impl Into<String>, skeleton: &str) -> Self {
        Self {
            component_id: component_id.into(),
            text: format!("{DEGRADED_MARKER}\n{skeleton}"),
            fidelity: InterfaceFidelity::Degraded,
        }
    }

    /// Content digest of the interface text, in `sha256:<hex>` form.
    ///
    /// This digest is what dependents fold into their cache keys, so any
    /// interface change invalidates every transitive descendant.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}
