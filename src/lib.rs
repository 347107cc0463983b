//! codeweave - dependency-aware incremental code generation.
//!
//! Turns a graph of natural-language component descriptions into a graph of
//! generated source artifacts, regenerating a component if and only if its
//! own inputs or any transitive dependency's public interface changed.
//!
//! # Architecture
//!
//! - `codeweave.toml` declares components, their descriptions, and their
//!   dependency edges ([`manifest`])
//! - the [`graph`] module validates the DAG and partitions it into
//!   parallelizable topological levels
//! - per node, the [`context`] assembler bundles the component's spec with
//!   its dependencies' *interfaces* (never their implementations), the
//!   [`backend`] adapter turns the bundle into source text, and the
//!   [`extract`] step reduces that source to a minimal public interface
//! - the [`cache`] keys every build by a content hash folding in the full
//!   transitive interface chain, so upstream changes invalidate exactly the
//!   affected descendants; the [`orchestrator`] schedules levels, bounds
//!   backend concurrency, retries transient failures, and routes failures to
//!   dependents without touching unrelated branches
//!
//! # Interface extraction
//!
//! Self-describing targets (Python) use the generated source verbatim as
//! their interface. Compiled targets (Java) go through a two-stage pipeline:
//! an external decompiler strips a compiler-produced interface binary down to
//! signatures, then a synthesis pass re-attaches a prose usage description,
//! because compilation erased parameter names and intent. Synthesis failure
//! degrades the interface; decompilation failure fails the node.

pub mod artifact;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod context;
pub mod core;
pub mod extract;
pub mod graph;
pub mod manifest;
pub mod orchestrator;
pub mod validate;
