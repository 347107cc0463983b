//! Content-addressed build cache.
//!
//! A cache entry is keyed by a [`ContentKey`]: a digest folding a component's
//! own inputs (description, docs, resource bytes, backend params, target
//! shape) together with the interface digests of its dependencies in declared
//! order. Because every dependency's key already folds in *its* dependencies'
//! interfaces, any upstream change invalidates every transitive descendant —
//! descendants are never silently stale.
//!
//! Entries are immutable: a changed key produces a new entry rather than
//! overwriting the old one, so stale entries can be garbage-collected by an
//! external sweep without ever being corrupted in place. Writes are
//! idempotent per key; concurrent writers race safely under
//! last-writer-wins.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::artifact::{GeneratedArtifact, InterfaceArtifact};
use crate::manifest::ComponentSpec;

/// Stable, order-sensitive cache key in `sha256:<64 hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey(String);

impl ContentKey {
    /// Compute the key for `spec` given its dependencies' interface digests
    /// in declared order.
    ///
    /// Resource files are read and their bytes folded in, so editing a
    /// resource invalidates the entry even though resources never enter the
    /// generation context. Every field is folded with a label and a length
    /// prefix; concatenation ambiguity cannot alias two different inputs to
    /// one key.
    pub fn compute(spec: &ComponentSpec, dep_interface_digests: &[String]) -> anyhow::Result<Self> {
        let mut hasher = Sha256::new();
        fold(&mut hasher, "description", spec.description.as_bytes());
        fold(&mut hasher, "language", spec.language.as_str().as_bytes());
        fold(&mut hasher, "kind", format!("{:?}", spec.kind).as_bytes());
        fold(&mut hasher, "module", spec.module.as_bytes());

        for doc in &spec.docs {
            fold(&mut hasher, "doc-name", doc.name.as_bytes());
            fold(&mut hasher, "doc-content", doc.content.as_bytes());
        }

        for resource in &spec.resources {
            let bytes = std::fs::read(resource).map_err(|e| {
                anyhow::anyhow!(
                    "cannot read resource {} for component '{}': {e}",
                    resource.display(),
                    spec.id
                )
            })?;
            fold(&mut hasher, "resource-name", resource.display().to_string().as_bytes());
            fold(&mut hasher, "resource-bytes", &bytes);
        }

        // Canonical JSON keeps float formatting stable across runs.
        let params = serde_json::to_string(&spec.params)?;
        fold(&mut hasher, "params", params.as_bytes());

        for digest in dep_interface_digests {
            fold(&mut hasher, "dep-interface", digest.as_bytes());
        }

        Ok(Self(format!("sha256:{}", hex::encode(hasher.finalize()))))
    }

    /// Digest of the component's own inputs, ignoring dependencies. Tags
    /// generated artifacts with the spec version that produced them.
    pub fn spec_digest(spec: &ComponentSpec) -> anyhow::Result<String> {
        Ok(Self::compute(spec, &[])?.0)
    }

    /// The bare hex portion, usable as a file name.
    pub fn hex(&self) -> &str {
        self.0.strip_prefix("sha256:").unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fold(hasher: &mut Sha256, label: &str, bytes: &[u8]) {
    hasher.update(label.as_bytes());
    hasher.update(b":");
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// One successful build, addressable by its content key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: ContentKey,
    pub generated: GeneratedArtifact,
    pub interface: InterfaceArtifact,
    pub built_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: ContentKey, generated: GeneratedArtifact, interface: InterfaceArtifact) -> Self {
        Self {
            key,
            generated,
            interface,
            built_at: Utc::now(),
        }
    }
}

/// Keyed artifact storage with idempotent writes.
///
/// Injected into the orchestrator explicitly rather than reached through a
/// singleton, so tests can substitute [`MemoryStore`].
pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &ContentKey) -> anyhow::Result<Option<CacheEntry>>;
    fn put(&self, entry: &CacheEntry) -> anyhow::Result<()>;
}

/// In-memory store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn get(&self, key: &ContentKey) -> anyhow::Result<Option<CacheEntry>> {
        Ok(self.entries.get(key.as_str()).map(|e| e.clone()))
    }

    fn put(&self, entry: &CacheEntry) -> anyhow::Result<()> {
        self.entries.insert(entry.key.as_str().to_string(), entry.clone());
        Ok(())
    }
}

/// Persistent store: one JSON file per key under a root directory.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so a crash mid-write never leaves a corrupt entry and concurrent
/// writers for the same key settle on last-writer-wins.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Default on-disk location: `~/.codeweave/cache`.
    pub fn default_root() -> anyhow::Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".codeweave").join("cache"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &ContentKey) -> PathBuf {
        self.root.join(format!("{}.json", key.hex()))
    }

    /// Remove every entry. Safe against concurrent readers: files vanish
    /// atomically, partial entries never appear.
    pub fn clear(&self) -> anyhow::Result<usize> {
        let mut removed = 0;
        for dir_entry in std::fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of entries currently on disk.
    pub fn entry_count(&self) -> anyhow::Result<usize> {
        let mut count = 0;
        for dir_entry in std::fs::read_dir(&self.root)? {
            if dir_entry?.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl ArtifactStore for FsStore {
    fn get(&self, key: &ContentKey) -> anyhow::Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(%key, "cache miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&content).map_err(|e| {
            anyhow::anyhow!("corrupt cache entry {}: {e}", path.display())
        })?;
        debug!(%key, "cache hit");
        Ok(Some(entry))
    }

    fn put(&self, entry: &CacheEntry) -> anyhow::Result<()> {
        let path = self.entry_path(&entry.key);
        let json = serde_json::to_string_pretty(entry)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&path)
            .map_err(|e| anyhow::anyhow!("cannot persist cache entry {}: {e}", path.display()))?;
        debug!(key = %entry.key, "cache entry written");
        Ok(())
    }
}
