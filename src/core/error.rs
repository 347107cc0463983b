//! User-facing error reporting for the CLI.
//!
//! Domain errors ([`crate::graph::GraphError`], [`crate::backend::GenerationError`],
//! [`crate::extract::ExtractionError`], [`crate::manifest::ManifestError`]) are
//! strongly typed where they occur; this module wraps whatever bubbles up to
//! `main` with a colored message and, where we can tell what went wrong, an
//! actionable suggestion.

use colored::Colorize;
use std::fmt;

use crate::graph::GraphError;
use crate::manifest::ManifestError;

/// An error paired with display context for terminal output.
pub struct ErrorContext {
    error: anyhow::Error,
    suggestion: Option<String>,
    details: Option<String>,
}

impl ErrorContext {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error, suggestion: None, details: None }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with color.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {cause}", "caused by:".yellow());
        }
        if let Some(details) = &self.details {
            eprintln!("\n{details}");
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("\n{} {suggestion}", "hint:".cyan().bold());
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {suggestion})")?;
        }
        Ok(())
    }
}

/// Attach suggestions for the failure shapes users actually hit.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(manifest_error) = error.downcast_ref::<ManifestError>() {
        let suggestion = match manifest_error {
            ManifestError::NotFound(_) => {
                Some("create a codeweave.toml in your project directory, or pass --manifest-path")
            }
            ManifestError::AmbiguousDescription { .. } => {
                Some("keep the description inline OR in a file, not both")
            }
            _ => None,
        };
        let mut ctx = ErrorContext::new(error);
        if let Some(s) = suggestion {
            ctx = ctx.with_suggestion(s);
        }
        return ctx;
    }

    if let Some(graph_error) = error.downcast_ref::<GraphError>() {
        let suggestion = match graph_error {
            GraphError::Cycle { .. } => {
                "break the cycle by removing one of the listed dependency edges"
            }
            GraphError::UnresolvedDependency { .. } => {
                "check the spelling of the dependency id against [components.*] tables"
            }
            GraphError::SelfDependency { .. } | GraphError::DuplicateDependency { .. } => {
                "fix the 'dependencies' list of the named component"
            }
        };
        return ErrorContext::new(error).with_suggestion(suggestion);
    }

    ErrorContext::new(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_gets_a_suggestion() {
        let err = anyhow::Error::from(GraphError::Cycle { chain: "a -> b -> a".to_string() });
        let ctx = user_friendly_error(err);
        assert!(ctx.to_string().contains("hint:"));
    }

    #[test]
    fn unknown_errors_pass_through() {
        let ctx = user_friendly_error(anyhow::anyhow!("something odd"));
        assert_eq!(ctx.to_string(), "something odd");
    }
}
