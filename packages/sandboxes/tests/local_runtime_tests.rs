// ABOUTME: Integration tests for the host-directory sandbox runtime
// ABOUTME: Filesystem mirroring under a temp dir and process output/readiness on unix shells

use futures_util::StreamExt;
use playground_core::{TemplateFile, TemplateFolder};
use playground_sandboxes::{to_mount_map, FsChange, LocalRuntime, SandboxError, SandboxRuntime};
use tempfile::TempDir;

async fn setup() -> (LocalRuntime, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let runtime = LocalRuntime::create(temp_dir.path().join("sandbox")).await.unwrap();
    (runtime, temp_dir)
}

#[tokio::test]
async fn test_mount_writes_files_and_empty_folders() {
    let (runtime, _temp_dir) = setup().await;
    let snapshot = TemplateFolder::new("root")
        .with_item(TemplateFile::new("package", "json", "{}"))
        .with_item(TemplateFolder::new("src").with_item(TemplateFile::new("index", "js", "main()")))
        .with_item(TemplateFolder::new("public"));

    runtime.mount(&to_mount_map(&snapshot)).await.unwrap();

    assert_eq!(runtime.read_file("package.json").await.unwrap().as_deref(), Some("{}"));
    assert_eq!(runtime.read_file("src/index.js").await.unwrap().as_deref(), Some("main()"));
    assert!(runtime.root().join("public").is_dir());
}

#[tokio::test]
async fn test_read_missing_file_is_none() {
    let (runtime, _temp_dir) = setup().await;
    assert_eq!(runtime.read_file("package.json").await.unwrap(), None);
}

#[tokio::test]
async fn test_structural_changes() {
    let (runtime, _temp_dir) = setup().await;
    runtime.write_file("src/a.js", "a").await.unwrap();

    runtime
        .apply(&FsChange::Rename {
            from: "src".to_string(),
            to: "app".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(runtime.read_file("app/a.js").await.unwrap().as_deref(), Some("a"));
    assert_eq!(runtime.read_file("src/a.js").await.unwrap(), None);

    runtime
        .apply(&FsChange::CreateDir {
            path: "app/lib".to_string(),
        })
        .await
        .unwrap();
    assert!(runtime.root().join("app/lib").is_dir());

    runtime.apply(&FsChange::Remove { path: "app".to_string() }).await.unwrap();
    assert!(!runtime.root().join("app").exists());

    // Removing again is fine
    runtime.remove("app").await.unwrap();
}

#[tokio::test]
async fn test_paths_cannot_escape_root() {
    let (runtime, temp_dir) = setup().await;

    let result = runtime.write_file("../outside.txt", "nope").await;

    assert!(matches!(result, Err(SandboxError::InvalidPath(_))));
    assert!(!temp_dir.path().join("outside.txt").exists());
}

#[tokio::test]
async fn test_rename_missing_source() {
    let (runtime, _temp_dir) = setup().await;
    let result = runtime.rename("ghost.js", "other.js").await;
    assert!(matches!(result, Err(SandboxError::FileNotFound(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_streams_output_and_detects_ready() {
    use playground_sandboxes::CommandSpec;

    let (runtime, _temp_dir) = setup().await;
    let mut ready_rx = runtime.server_ready();

    let command = CommandSpec::new(
        "sh",
        ["-c", "echo starting; echo 'warn' 1>&2; echo '  Local:   http://localhost:4321/'"],
    );
    let process = runtime.spawn(&command).await.unwrap();
    let mut lines: Vec<String> = process.output.collect().await;
    lines.sort();

    assert_eq!(lines, vec!["  Local:   http://localhost:4321/", "starting", "warn"]);
    assert_eq!(process.exit.await.unwrap(), 0);

    let ready = ready_rx.recv().await.unwrap();
    assert_eq!(ready.port, 4321);
    assert_eq!(ready.url, "http://localhost:4321");
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_runs_in_sandbox_root_and_reports_exit_code() {
    use playground_sandboxes::CommandSpec;

    let (runtime, _temp_dir) = setup().await;
    runtime.write_file("marker.txt", "here").await.unwrap();

    let process = runtime
        .spawn(&CommandSpec::new("sh", ["-c", "cat marker.txt; exit 3"]))
        .await
        .unwrap();
    let lines: Vec<String> = process.output.collect().await;

    assert_eq!(lines, vec!["here"]);
    assert_eq!(process.exit.await.unwrap(), 3);
}

#[tokio::test]
async fn test_spawn_unknown_program_fails() {
    let (runtime, _temp_dir) = setup().await;
    let result = runtime
        .spawn(&playground_sandboxes::CommandSpec::new("definitely-not-a-real-binary-xyz", Vec::<String>::new()))
        .await;
    assert!(matches!(result, Err(SandboxError::ProcessSpawnFailed { .. })));
}
