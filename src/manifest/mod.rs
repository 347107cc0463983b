//! Project manifest parsing and validation (`codeweave.toml`).
//!
//! The manifest is the declarative input for one build invocation: it names
//! every component, its natural-language description, its target language,
//! and its dependency edges, plus the backend and toolchain configuration.
//!
//! # Manifest format
//!
//! ```toml
//! [project]
//! out_dir = "generated"
//!
//! [backend]
//! endpoint = "https://llm.internal/v1/generate"
//! model = "gemini-2.0-flash-001"
//!
//! [components.tokenizer]
//! description_file = "specs/tokenizer.txt"
//! language = "python"
//! module = "pipeline.tokenizer"
//!
//! [components.parser]
//! description = "Parse the token stream into an AST."
//! language = "python"
//! module = "pipeline.parser"
//! dependencies = ["tokenizer"]
//! docs = ["docs/grammar.md"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod component;

pub use component::{BackendParams, ComponentSpec, Doc, TargetKind, TargetLanguage};

/// Default manifest file name searched for in the working directory.
pub const MANIFEST_NAME: &str = "codeweave.toml";

/// Errors produced while loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest file {0} not found")]
    NotFound(PathBuf),

    #[error("invalid manifest syntax in {file}: {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("component '{id}' must set exactly one of 'description' or 'description_file'")]
    AmbiguousDescription { id: String },

    #[error("cannot read {role} file {path} for component '{id}': {source}")]
    UnreadableInput {
        id: String,
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("component '{id}' has an empty description")]
    EmptyDescription { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Backend transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Generation endpoint URL. Absent means only offline builds are possible.
    pub endpoint: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Default model for components that do not override it.
    pub model: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: default_api_key_env(),
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Compiled-target toolchain configuration.
///
/// Only consulted for components on the structural-strip extraction path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Argv prefix of the external decompiler command.
    #[serde(default)]
    pub decompiler: Vec<String>,
    /// Directory containing compiler-produced interface binaries, one
    /// `<component-id>.jar` per compiled component.
    pub interface_dir: Option<PathBuf>,
    /// Optional argv prefix of a syntax checker; the generated source path is
    /// appended as the final argument.
    #[serde(default)]
    pub syntax_check: Vec<String>,
    /// Decompiler timeout in seconds.
    #[serde(default = "default_decompile_timeout")]
    pub decompile_timeout_secs: u64,
}

const fn default_decompile_timeout() -> u64 {
    60
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory generated sources and interfaces are written to.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Cache directory override; defaults to `~/.codeweave/cache`.
    pub cache_dir: Option<PathBuf>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            cache_dir: None,
        }
    }
}

/// Raw per-component manifest entry, before descriptions and docs are loaded.
#[derive(Debug, Clone, Deserialize)]
struct RawComponent {
    description: Option<String>,
    description_file: Option<PathBuf>,
    language: TargetLanguage,
    #[serde(default)]
    kind: TargetKind,
    /// Module/package path the generated file is importable from.
    module: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    docs: Vec<PathBuf>,
    #[serde(default)]
    resources: Vec<PathBuf>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    project: ProjectConfig,
    #[serde(default)]
    backend: BackendConfig,
    #[serde(default)]
    toolchain: ToolchainConfig,
    /// BTreeMap keeps component iteration deterministic across runs.
    #[serde(default)]
    components: BTreeMap<String, RawComponent>,
}

/// A fully loaded manifest: configuration plus resolved component specs.
///
/// Loading resolves `description_file` and `docs` references to their
/// contents, so a [`ComponentSpec`] is self-contained from here on. Paths in
/// `resources` stay as paths relative to the manifest directory; their bytes
/// are folded into cache identity at key-computation time.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub project: ProjectConfig,
    pub backend: BackendConfig,
    pub toolchain: ToolchainConfig,
    pub components: Vec<ComponentSpec>,
    /// Directory the manifest was loaded from; relative paths resolve here.
    pub base_dir: PathBuf,
}

impl Manifest {
    /// Load and validate a manifest from `path`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let raw: RawManifest = toml::from_str(&content).map_err(|e| ManifestError::Parse {
            file: path.to_path_buf(),
            source: Box::new(e),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let default_model = raw.backend.model.clone();

        let mut components = Vec::with_capacity(raw.components.len());
        for (id, rc) in raw.components {
            components.push(Self::resolve_component(&base_dir, id, rc, default_model.as_deref())?);
        }

        Ok(Self {
            project: raw.project,
            backend: raw.backend,
            toolchain: raw.toolchain,
            components,
            base_dir,
        })
    }

    fn resolve_component(
        base_dir: &Path,
        id: String,
        raw: RawComponent,
        default_model: Option<&str>,
    ) -> Result<ComponentSpec, ManifestError> {
        let description = match (raw.description, raw.description_file) {
            (Some(text), None) => text,
            (None, Some(file)) => {
                let path = base_dir.join(&file);
                std::fs::read_to_string(&path).map_err(|source| ManifestError::UnreadableInput {
                    id: id.clone(),
                    role: "description",
                    path,
                    source,
                })?
            }
            _ => return Err(ManifestError::AmbiguousDescription { id }),
        };
        if description.trim().is_empty() {
            return Err(ManifestError::EmptyDescription { id });
        }

        let mut docs = Vec::with_capacity(raw.docs.len());
        for doc_path in raw.docs {
            let path = base_dir.join(&doc_path);
            let content = std::fs::read_to_string(&path).map_err(|source| {
                ManifestError::UnreadableInput {
                    id: id.clone(),
                    role: "doc",
                    path,
                    source,
                }
            })?;
            docs.push(Doc {
                name: doc_path.display().to_string(),
                content,
            });
        }

        let params = BackendParams {
            model: raw
                .model
                .or_else(|| default_model.map(str::to_string))
                .unwrap_or_else(|| "default".to_string()),
            temperature: raw.temperature.unwrap_or(0.2),
            max_output_tokens: raw.max_output_tokens.unwrap_or(8192),
        };

        Ok(ComponentSpec {
            id,
            description,
            language: raw.language,
            kind: raw.kind,
            module: raw.module,
            dependencies: raw.dependencies,
            docs,
            resources: raw.resources.iter().map(|r| base_dir.join(r)).collect(),
            params,
        })
    }
}
