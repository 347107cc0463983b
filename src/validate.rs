//! Post-generation source validation.
//!
//! Cheap structural checks per target language, plus an optional external
//! syntax-check command. Failures here feed the repair loop: the orchestrator
//! regenerates with the validation error attached to the bundle, a bounded
//! number of times.

use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use crate::manifest::{ComponentSpec, TargetKind, TargetLanguage};

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("generated source is empty")]
    Empty,

    #[error("Java source must contain at least one class, interface, or enum declaration")]
    MissingTypeDeclaration,

    #[error("Java source must start with 'package {expected};'")]
    MissingPackageDeclaration { expected: String },

    #[error("executable target must define an entry point ({expected})")]
    MissingEntryPoint { expected: &'static str },

    #[error("syntax check failed:\n{output}")]
    SyntaxCheckFailed { output: String },

    #[error("syntax check could not run: {reason}")]
    SyntaxCheckUnavailable { reason: String },
}

/// Structural validation of generated source.
pub fn validate_source(source: &str, spec: &ComponentSpec) -> Result<(), ValidationError> {
    if source.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    match spec.language {
        TargetLanguage::Python => {
            if spec.kind == TargetKind::Binary && !source.contains("__main__") {
                return Err(ValidationError::MissingEntryPoint {
                    expected: "if __name__ == \"__main__\":",
                });
            }
        }
        TargetLanguage::Java => {
            if !["class ", "interface ", "enum "].iter().any(|kw| source.contains(kw)) {
                return Err(ValidationError::MissingTypeDeclaration);
            }
            let expected = format!("package {};", spec.module);
            // Comments may precede the package declaration.
            if !source.contains(&expected) {
                return Err(ValidationError::MissingPackageDeclaration { expected: spec.module.clone() });
            }
            if spec.kind == TargetKind::Binary && !source.contains("static void main") {
                return Err(ValidationError::MissingEntryPoint {
                    expected: "public static void main(String[] args)",
                });
            }
        }
    }
    Ok(())
}

/// Run the configured external syntax checker against a source file.
///
/// The checker argv gets the file path appended; a non-zero exit fails
/// validation with the tool's combined output.
pub async fn run_syntax_check(argv: &[String], source_file: &Path) -> Result<(), ValidationError> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    let output = Command::new(program)
        .args(args)
        .arg(source_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ValidationError::SyntaxCheckUnavailable {
            reason: format!("failed to spawn {program}: {e}"),
        })?;

    if output.status.success() {
        return Ok(());
    }
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(ValidationError::SyntaxCheckFailed { output: combined.trim().to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::BackendParams;

    fn spec(language: TargetLanguage, kind: TargetKind) -> ComponentSpec {
        ComponentSpec {
            id: "x".to_string(),
            description: "desc".to_string(),
            language,
            kind,
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

    #[test]
    fn empty_source_rejected() {
        let err = validate_source("  \n", &spec(TargetLanguage::Python, TargetKind::Library));
        assert!(matches!(err, Err(ValidationError::Empty)));
    }

    #[test]
    fn python_library_accepts_plain_module() {
        let ok = validate_source("def f(): ...\n", &spec(TargetLanguage::Python, TargetKind::Library));
        assert!(ok.is_ok());
    }

    #[test]
    fn python_binary_needs_main_guard() {
        let s = spec(TargetLanguage::Python, TargetKind::Binary);
        assert!(validate_source("def f(): ...\n", &s).is_err());
        assert!(validate_source("if __name__ == \"__main__\":\n    f()\n", &s).is_ok());
    }

    #[test]
    fn java_needs_type_and_package() {
        let s = spec(TargetLanguage::Java, TargetKind::Library);
        assert!(matches!(
            validate_source("int x = 1;", &s),
            Err(ValidationError::MissingTypeDeclaration)
        ));
        assert!(matches!(
            validate_source("public class X {}", &s),
            Err(ValidationError::MissingPackageDeclaration { .. })
        ));
        assert!(validate_source("package com.example;\npublic class X {}", &s).is_ok());
    }

    #[test]
    fn java_binary_needs_main() {
        let s = spec(TargetLanguage::Java, TargetKind::Binary);
        let no_main = "package com.example;\npublic class X {}";
        assert!(matches!(
            validate_source(no_main, &s),
            Err(ValidationError::MissingEntryPoint { .. })
        ));
        let with_main =
            "package com.example;\npublic class X { public static void main(String[] args) {} }";
        assert!(validate_source(with_main, &s).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn syntax_check_reports_tool_output() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("x.py");
        std::fs::write(&file, "def f(:").unwrap();

        let ok = run_syntax_check(&["true".to_string()], &file).await;
        assert!(ok.is_ok());

        let err = run_syntax_check(&["false".to_string()], &file).await.unwrap_err();
        assert!(matches!(err, ValidationError::SyntaxCheckFailed { .. }));
    }
}
