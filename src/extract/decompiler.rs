//! External decompiler invocation for the structural-strip path.
//!
//! The decompiler is a toolchain collaborator: given a compiled interface
//! binary and a fully qualified symbol name, it reconstructs a source-level
//! skeleton (signatures, no bodies, no parameter names guaranteed). The step
//! is mechanical and deterministic, and it must fail loudly when the symbol
//! cannot be located; silent degradation here would poison every dependent's
//! generation context.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::ExtractionError;

/// Builder for one decompile invocation.
///
/// The configured argv prefix is extended with
/// `--input-jar <binary> --classname <symbol> --outfile <skeleton>`; the
/// tool is expected to write the skeleton for the named symbol and its
/// nested members, and exit non-zero if the symbol is absent.
#[derive(Debug, Clone)]
pub struct DecompilerCommand {
    argv: Vec<String>,
    timeout: Duration,
}

impl DecompilerCommand {
    pub fn new(argv: Vec<String>, timeout_secs: u64) -> Result<Self, ExtractionError> {
        if argv.is_empty() {
            return Err(ExtractionError::ToolchainUnconfigured);
        }
        Ok(Self {
            argv,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Decompile `symbol` out of `binary`, returning the skeleton text.
    pub async fn decompile(
        &self,
        binary: &Path,
        symbol: &str,
    ) -> Result<String, ExtractionError> {
        if !binary.exists() {
            return Err(ExtractionError::InterfaceBinaryMissing { path: binary.to_path_buf() });
        }

        let out_dir = tempfile::tempdir().map_err(|e| ExtractionError::DecompilerFailed {
            symbol: symbol.to_string(),
            reason: format!("cannot create scratch directory: {e}"),
        })?;
        let out_file = out_dir.path().join("skeleton.java");

        let mut command = Command::new(&self.argv[0]);
        command
            .args(&self.argv[1..])
            .arg("--input-jar")
            .arg(binary)
            .arg("--classname")
            .arg(symbol)
            .arg("--outfile")
            .arg(&out_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        debug!(%symbol, binary = %binary.display(), "running decompiler");
        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| ExtractionError::DecompilerFailed {
                symbol: symbol.to_string(),
                reason: format!("decompiler timed out after {:?}", self.timeout),
            })?
            .map_err(|e| ExtractionError::DecompilerFailed {
                symbol: symbol.to_string(),
                reason: format!("failed to spawn {}: {e}", self.argv[0]),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::SymbolNotFound {
                symbol: symbol.to_string(),
                binary: binary.to_path_buf(),
                detail: stderr.trim().to_string(),
            });
        }

        // An empty or absent outfile with a zero exit is still a hard failure.
        match std::fs::read_to_string(&out_file) {
            Ok(skeleton) if !skeleton.trim().is_empty() => Ok(skeleton),
            Ok(_) | Err(_) => Err(ExtractionError::SymbolNotFound {
                symbol: symbol.to_string(),
                binary: binary.to_path_buf(),
                detail: "decompiler produced no output".to_string(),
            }),
        }
    }
}

/// Locate the compiled interface binary for a component id.
pub fn interface_binary_path(interface_dir: &Path, component_id: &str) -> PathBuf {
    interface_dir.join(format!("{component_id}.jar"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_argv_is_unconfigured() {
        assert!(matches!(
            DecompilerCommand::new(vec![], 10),
            Err(ExtractionError::ToolchainUnconfigured)
        ));
    }

    #[tokio::test]
    async fn missing_binary_fails_loudly() {
        let cmd = DecompilerCommand::new(vec!["true".to_string()], 10).unwrap();
        let err = cmd.decompile(Path::new("/nonexistent/iface.jar"), "a.B").await.unwrap_err();
        assert!(matches!(err, ExtractionError::InterfaceBinaryMissing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_decompile_reads_outfile() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("iface.jar");
        fs::write(&binary, b"not really a jar").unwrap();

        // Stand-in decompiler: writes a fixed skeleton to the --outfile arg
        // (last argv position).
        let script = tmp.path().join("decompile.sh");
        fs::write(
            &script,
            "#!/bin/sh\nout=\"\"\nfor a in \"$@\"; do out=\"$a\"; done\nprintf 'public class B {}\\n' > \"$out\"\n",
        )
        .unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let cmd =
            DecompilerCommand::new(vec![script.display().to_string()], 10).unwrap();
        let skeleton = cmd.decompile(&binary, "a.B").await.unwrap();
        assert!(skeleton.contains("public class B"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_symbol_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("iface.jar");
        fs::write(&binary, b"jar").unwrap();

        let cmd = DecompilerCommand::new(vec!["false".to_string()], 10).unwrap();
        let err = cmd.decompile(&binary, "a.Missing").await.unwrap_err();
        let ExtractionError::SymbolNotFound { symbol, .. } = err else {
            panic!("expected SymbolNotFound");
        };
        assert_eq!(symbol, "a.Missing");
    }
}
