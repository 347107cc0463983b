//! Context assembly: building the exact generation input for one component.
//!
//! The bundle for component C contains C's own description and docs plus the
//! *interface* of each dependency, labeled with its originating component id
//! and supplied in declared dependency order. It never contains a
//! dependency's full implementation; generation of C must be reproducible
//! from C's spec and its dependencies' interfaces alone.

use serde::Serialize;
use std::path::PathBuf;

use crate::artifact::InterfaceArtifact;
use crate::manifest::{BackendParams, ComponentSpec, Doc, TargetKind, TargetLanguage};

/// A dependency interface labeled with the component it came from, so the
/// backend can disambiguate same-named symbols across dependencies.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabeledInterface {
    pub component_id: String,
    pub text: String,
}

/// Feedback appended to a bundle when a previous attempt failed validation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RepairFeedback {
    pub error: String,
    pub previous_source: String,
}

/// The complete input for one backend generation call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationBundle {
    pub component_id: String,
    pub description: String,
    pub language: TargetLanguage,
    pub kind: TargetKind,
    /// Module/package path the generated file must be importable from.
    pub module: String,
    /// Primary type name for compiled targets.
    pub type_name: String,
    pub docs: Vec<Doc>,
    /// Dependency interfaces in declared `dependencies` order.
    pub dep_interfaces: Vec<LabeledInterface>,
    /// Resource files available to the generated program at runtime.
    pub resources: Vec<PathBuf>,
    /// Language-directed generation requirements.
    pub preamble: String,
    /// Backend tuning for this component.
    pub params: BackendParams,
    /// Set on repair attempts after a validation failure.
    pub repair: Option<RepairFeedback>,
}

/// Build the generation bundle for `spec`.
///
/// `dep_interfaces` must already be in the exact order of
/// `spec.dependencies`; the orchestrator guarantees this regardless of the
/// completion order of parallel sibling builds.
pub fn assemble(spec: &ComponentSpec, dep_interfaces: &[InterfaceArtifact]) -> GenerationBundle {
    debug_assert_eq!(spec.dependencies.len(), dep_interfaces.len());

    let labeled = spec
        .dependencies
        .iter()
        .zip(dep_interfaces)
        .map(|(id, iface)| LabeledInterface {
            component_id: id.clone(),
            text: iface.text.clone(),
        })
        .collect();

    GenerationBundle {
        component_id: spec.id.clone(),
        description: spec.description.clone(),
        language: spec.language,
        kind: spec.kind,
        module: spec.module.clone(),
        type_name: spec.type_name(),
        docs: spec.docs.clone(),
        dep_interfaces: labeled,
        resources: spec.resources.clone(),
        preamble: preamble_for(spec),
        params: spec.params.clone(),
        repair: None,
    }
}

impl GenerationBundle {
    /// Derive a repair bundle carrying the validation error and the rejected
    /// source, so the backend can fix rather than regenerate blind.
    pub fn with_repair_feedback(&self, error: &str, previous_source: &str) -> Self {
        let mut bundle = self.clone();
        bundle.repair = Some(RepairFeedback {
            error: error.to_string(),
            previous_source: previous_source.to_string(),
        });
        bundle
    }

    /// Render the bundle as the instruction text sent to the backend.
    pub fn render_instructions(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.preamble);

        if !self.dep_interfaces.is_empty() {
            out.push_str(
                "\nThe following are the public interfaces of this component's dependencies. \
                 Do not reimplement them; interact with them through imports.\n\n",
            );
            for dep in &self.dep_interfaces {
                out.push_str(&format!("# Dependency: {}\n{}\n---\n", dep.component_id, dep.text));
            }
        }

        if !self.docs.is_empty() {
            out.push_str("\nReference documentation:\n\n");
            for doc in &self.docs {
                out.push_str(&format!("# Documentation: {}\n{}\n---\n", doc.name, doc.content));
            }
        }

        if !self.resources.is_empty() {
            out.push_str("\nResource files available to the generated program:\n");
            for resource in &self.resources {
                out.push_str(&format!("- {}\n", resource.display()));
            }
        }

        if let Some(repair) = &self.repair {
            out.push_str(&format!(
                "\nYour previous attempt failed validation with this error:\n\n{}\n\n\
                 Previous code:\n\n```\n{}\n```\n\n\
                 Provide a complete, fixed implementation, not a diff.\n",
                repair.error, repair.previous_source
            ));
        }

        out
    }
}

/// Language-directed requirements for the generated source.
fn preamble_for(spec: &ComponentSpec) -> String {
    let mut out = String::new();
    match spec.language {
        TargetLanguage::Python => {
            out.push_str(&format!(
                "Generate Python code for the component description provided.\n\
                 Requirements:\n\
                 - Type hints on all functions; modern union/builtin generic syntax.\n\
                 - Docstrings on public functions and classes.\n\
                 - The module will be importable as '{}'.\n",
                spec.module
            ));
            if spec.kind == TargetKind::Binary {
                out.push_str(
                    "- This is an executable: include an `if __name__ == \"__main__\":` entry point.\n",
                );
            }
        }
        TargetLanguage::Java => {
            let type_name = spec.type_name();
            out.push_str(&format!(
                "Generate Java code for the component description provided.\n\
                 Requirements:\n\
                 - The primary public class MUST be named '{type_name}' to match the output file.\n\
                 - The file MUST begin with 'package {};'.\n\
                 - Javadoc on public classes and methods; imports after the package declaration.\n",
                spec.module
            ));
            if spec.kind == TargetKind::Binary {
                out.push_str(&format!(
                    "- This is an executable: include `public static void main(String[] args)` in {type_name}.\n",
                ));
            }
        }
    }
    out
}
