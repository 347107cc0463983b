//! Component descriptors: the immutable per-component build inputs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported generation target languages.
///
/// The set is closed; extraction and validation dispatch on it explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Python,
    Java,
}

impl TargetLanguage {
    /// Whether the generated source doubles as its own interface.
    ///
    /// Python has no separate compiled-interface representation, so the full
    /// source is already the smallest faithful interface. Java goes through
    /// the structural-strip path against a compiled interface binary.
    pub const fn is_self_describing(self) -> bool {
        matches!(self, Self::Python)
    }

    pub const fn source_extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Java => "java",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Java => "java",
        }
    }
}

/// Whether a component is a library or a standalone executable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Library,
    Binary,
}

/// Generation backend tuning, folded into cache identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendParams {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// An auxiliary reference text blob fed to generation as documentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doc {
    pub name: String,
    pub content: String,
}

/// One component: a natural-language behavior spec plus declared dependencies.
///
/// Immutable for the duration of a build invocation. `dependencies` is an
/// ordered sequence; the order is part of the component's cache identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Unique id within the component graph.
    pub id: String,
    /// The natural-language behavior description.
    pub description: String,
    pub language: TargetLanguage,
    pub kind: TargetKind,
    /// Module/package path the generated file is importable from.
    pub module: String,
    /// Ids of components this one depends on, in declared order.
    pub dependencies: Vec<String>,
    /// Reference documentation passed to generation.
    pub docs: Vec<Doc>,
    /// Opaque files available to the generated program. Their bytes count
    /// toward cache identity but are never inlined into generation context.
    pub resources: Vec<PathBuf>,
    pub params: BackendParams,
}

impl ComponentSpec {
    /// Name of the primary type for compiled targets, derived from the id.
    ///
    /// `token-stream` becomes `TokenStream`, matching the requirement that the
    /// primary public class match the output file name.
    pub fn type_name(&self) -> String {
        self.id
            .split(['-', '_'])
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Fully qualified symbol name handed to the decompiler.
    pub fn qualified_symbol(&self) -> String {
        format!("{}.{}", self.module, self.type_name())
    }

    /// File name the generated source is written under.
    pub fn output_file_name(&self) -> String {
        match self.language {
            TargetLanguage::Python => format!("{}.{}", self.id, self.language.source_extension()),
            TargetLanguage::Java => {
                format!("{}.{}", self.type_name(), self.language.source_extension())
            }
        }
    }
}
