//! Generation backend adapters.
//!
//! The backend is an external, slow, possibly non-deterministic collaborator.
//! Adapters only serialize the bundle into the backend's transport, parse the
//! response, and classify failures; retry policy lives in the orchestrator.
//!
//! Dispatch is a closed enum rather than trait objects: the set of supported
//! backends is small and known, and the explicit switch keeps the async
//! surface simple.

use thiserror::Error;

use crate::context::GenerationBundle;

mod fixture;
mod http;

pub use fixture::FixtureBackend;
pub use http::HttpBackend;

/// Classified backend failures.
///
/// Only [`GenerationError::Transient`] is eligible for automatic retry.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("transient backend failure: {reason}")]
    Transient { reason: String },

    #[error("backend rejected the request: {reason}")]
    PermanentRejection { reason: String },

    #[error("backend quota exceeded: {reason}")]
    QuotaExceeded { reason: String },

    #[error("backend call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl GenerationError {
    /// Whether the orchestrator may retry this failure with backoff.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// A generation backend, selected by configuration.
#[derive(Debug)]
pub enum Backend {
    /// Networked JSON transport to a real generation service.
    Http(HttpBackend),
    /// Deterministic offline backend for dry runs and tests.
    Fixture(FixtureBackend),
}

impl Backend {
    /// Generate source text for `bundle`.
    ///
    /// One request per call; no streaming, no internal retries.
    pub async fn generate(&self, bundle: &GenerationBundle) -> Result<String, GenerationError> {
        match self {
            Self::Http(backend) => backend.generate(bundle).await,
            Self::Fixture(backend) => backend.generate(bundle).await,
        }
    }

    /// Synthesize a short prose usage description for a compiled component.
    ///
    /// `source` is the full generated implementation; `skeleton` is the
    /// decompiled signature listing whose parameter names were erased by
    /// compilation. The description must let a consumer use the component
    /// without seeing `source`.
    pub async fn describe_usage(
        &self,
        component_id: &str,
        source: &str,
        skeleton: &str,
    ) -> Result<String, GenerationError> {
        match self {
            Self::Http(backend) => backend.describe_usage(component_id, source, skeleton).await,
            Self::Fixture(backend) => backend.describe_usage(component_id, source, skeleton).await,
        }
    }
}

/// Prompt contract for usage synthesis.
///
/// Public interface only; primitive parameter semantics must be spelled out
/// because the consumer will not have parameter names; bounded length.
pub(crate) fn usage_synthesis_instructions(source: &str) -> String {
    format!(
        "Write a concise usage guide (300 words or less) for the following source file, \
         for consumption by a code generator.\n\
         Start by briefly describing the purpose of this component.\n\
         Describe ONLY the public interface; omit internal details unless essential for correct usage.\n\
         Clarify the semantic interpretation of primitive arguments to public methods: \
         the consumer will NOT have access to parameter names.\n\n\
         Source code:\n\n```\n{source}\n```\n"
    )
}
