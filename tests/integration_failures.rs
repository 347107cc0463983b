//! Failure propagation and extraction-degradation behavior.

mod common;

use codeweave::backend::{FixtureBackend, GenerationError};
use codeweave::cache::MemoryStore;
use codeweave::orchestrator::{BuildOptions, NodeStatus};
use common::{graph, run_build, spec};

#[tokio::test]
async fn failure_blocks_descendants_but_not_siblings() {
    let store = MemoryStore::new();
    // X fails; Z depends on X; Y is unrelated.
    let g = graph(vec![spec("x", &[]), spec("y", &[]), spec("z", &["x"])]);

    let fixture = FixtureBackend::new();
    fixture.fail_generation(
        "x",
        GenerationError::PermanentRejection { reason: "rejected".to_string() },
        1,
    );
    let (report, _) = run_build(fixture, &store, &g, BuildOptions::default()).await;

    assert!(matches!(report.status_of("x"), Some(NodeStatus::Failed { .. })));
    assert_eq!(report.status_of("y"), Some(&NodeStatus::Built));
    assert_eq!(
        report.status_of("z"),
        Some(&NodeStatus::Skipped { blocked_by: "x".to_string() })
    );
}

#[tokio::test]
async fn skip_reason_names_the_original_failure() {
    let store = MemoryStore::new();
    // Chain x -> m -> z: z's blocker is x, not the intermediate skip m.
    let g = graph(vec![spec("x", &[]), spec("m", &["x"]), spec("z", &["m"])]);

    let fixture = FixtureBackend::new();
    fixture.fail_generation(
        "x",
        GenerationError::QuotaExceeded { reason: "out of credits".to_string() },
        1,
    );
    let (report, _) = run_build(fixture, &store, &g, BuildOptions::default()).await;

    assert_eq!(
        report.status_of("m"),
        Some(&NodeStatus::Skipped { blocked_by: "x".to_string() })
    );
    assert_eq!(
        report.status_of("z"),
        Some(&NodeStatus::Skipped { blocked_by: "x".to_string() })
    );
}

#[tokio::test]
async fn skipped_nodes_never_reach_the_backend() {
    let store = MemoryStore::new();
    let g = graph(vec![spec("x", &[]), spec("z", &["x"])]);

    let fixture = FixtureBackend::new();
    fixture.fail_generation(
        "x",
        GenerationError::PermanentRejection { reason: "no".to_string() },
        1,
    );
    let (_, calls) = run_build(fixture, &store, &g, BuildOptions::default()).await;
    // Only x's single (failed) attempt; z was short-circuited.
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn timeout_is_not_retried() {
    let store = MemoryStore::new();
    let g = graph(vec![spec("a", &[])]);

    let fixture = FixtureBackend::new();
    fixture.fail_generation("a", GenerationError::Timeout { seconds: 30 }, 1);
    let (report, calls) = run_build(fixture, &store, &g, BuildOptions::default()).await;

    assert!(matches!(report.status_of("a"), Some(NodeStatus::Failed { .. })));
    assert_eq!(calls, 1);
}

#[cfg(unix)]
mod compiled_path {
    use codeweave::artifact::{DEGRADED_MARKER, InterfaceFidelity};
    use codeweave::backend::{Backend, FixtureBackend};
    use codeweave::cache::MemoryStore;
    use codeweave::graph::ComponentGraph;
    use codeweave::manifest::{
        BackendParams, ComponentSpec, TargetKind, TargetLanguage, ToolchainConfig,
    };
    use codeweave::orchestrator::{BuildOptions, NodeStatus, Orchestrator};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn java_spec(id: &str) -> ComponentSpec {
        ComponentSpec {
            id: id.to_string(),
            description: format!("component {id}"),
            language: TargetLanguage::Java,
            kind: TargetKind::Library,
            module: "com.example".to_string(),
            dependencies: vec![],
            docs: vec![],
            resources: vec![],
            params: BackendParams {
                model: "fixture".to_string(),
                temperature: 0.2,
                max_output_tokens: 1024,
            },
        }
    }

    /// A stand-in decompiler: writes a fixed skeleton to the --outfile
    /// argument and ignores the jar contents.
    fn fake_toolchain(dir: &Path, component_id: &str) -> ToolchainConfig {
        let iface_dir = dir.join("ijars");
        std::fs::create_dir_all(&iface_dir).unwrap();
        std::fs::write(iface_dir.join(format!("{component_id}.jar")), b"jar").unwrap();

        let script = dir.join("decompile.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nout=\"\"\nfor a in \"$@\"; do out=\"$a\"; done\n\
             printf 'public class Widget { public int frob(int a); }\\n' > \"$out\"\n",
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        ToolchainConfig {
            decompiler: vec![script.display().to_string()],
            interface_dir: Some(iface_dir),
            syntax_check: vec![],
            decompile_timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_instead_of_failing() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(tmp.path(), "widget");

        let fixture = FixtureBackend::new();
        fixture.fail_usage_synthesis("widget");
        let backend = Backend::Fixture(fixture);
        let store = MemoryStore::new();
        let graph = ComponentGraph::build(vec![java_spec("widget")]).unwrap();

        let report = Orchestrator::new(&backend, &store, &toolchain, BuildOptions::default())
            .run(&graph)
            .await;

        assert_eq!(report.status_of("widget"), Some(&NodeStatus::Built));
        let entry = report.nodes[0].entry.as_ref().unwrap();
        assert_eq!(entry.interface.fidelity, InterfaceFidelity::Degraded);
        assert!(entry.interface.text.starts_with(DEGRADED_MARKER));
        assert!(entry.interface.text.contains("public class Widget"));
    }

    #[tokio::test]
    async fn successful_synthesis_prepends_usage_block() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = fake_toolchain(tmp.path(), "widget");

        let backend = Backend::Fixture(FixtureBackend::new());
        let store = MemoryStore::new();
        let graph = ComponentGraph::build(vec![java_spec("widget")]).unwrap();

        let report = Orchestrator::new(&backend, &store, &toolchain, BuildOptions::default())
            .run(&graph)
            .await;

        assert_eq!(report.status_of("widget"), Some(&NodeStatus::Built));
        let entry = report.nodes[0].entry.as_ref().unwrap();
        assert_eq!(entry.interface.fidelity, InterfaceFidelity::Full);
        assert!(entry.interface.text.starts_with("/**"));
        assert!(entry.interface.text.contains("public class Widget"));
    }

    #[tokio::test]
    async fn missing_interface_binary_fails_the_node() {
        let tmp = tempfile::tempdir().unwrap();
        let mut toolchain = fake_toolchain(tmp.path(), "widget");
        // Point at an empty directory: the binary for 'widget' is absent.
        let empty = tmp.path().join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        toolchain.interface_dir = Some(empty);

        let backend = Backend::Fixture(FixtureBackend::new());
        let store = MemoryStore::new();
        let graph = ComponentGraph::build(vec![java_spec("widget")]).unwrap();

        let report = Orchestrator::new(&backend, &store, &toolchain, BuildOptions::default())
            .run(&graph)
            .await;
        assert!(matches!(report.status_of("widget"), Some(NodeStatus::Failed { .. })));
    }
}
