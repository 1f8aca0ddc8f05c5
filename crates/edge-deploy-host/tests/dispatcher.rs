//! Integration tests for edge-deploy-host.
//!
//! These tests drive [`ShortcutDispatcher`] the way an interactive host does:
//! - Shortcut routing and unknown keys
//! - Progress messages for success and failure
//! - Serialized builds

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use edge_deploy_common::{BuildConfig, CompilerMode, DeployError};
use edge_deploy_core::{CompileOutput, CompilerAdapter, DeployPipeline, ProgressSender};
use edge_deploy_host::{HostHandler, ShortcutDispatcher};

const BINARY: &[u8] = b"\0asm\x01\0\0\0";

/// Compiler double that can fail and tracks overlapping calls.
#[derive(Default)]
struct FakeCompiler {
    fail_with: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

#[async_trait]
impl CompilerAdapter for FakeCompiler {
    fn name(&self) -> &str {
        "fake"
    }

    async fn compile(
        &self,
        mode: CompilerMode,
        mut progress: ProgressSender,
    ) -> Result<CompileOutput, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        progress
            .send(format!("tinygo build ({})", mode.identifier()))
            .await;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(reason) => Err(DeployError::compile_failed(reason.clone())),
            None => Ok(CompileOutput::new(BINARY, "// shim")),
        }
    }
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("web")).unwrap();
    std::fs::write(dir.path().join("web/main.go"), "package main\n").unwrap();
    dir
}

fn dispatcher(dir: &TempDir, compiler: Arc<FakeCompiler>) -> ShortcutDispatcher {
    let config = BuildConfig {
        root_dir: dir.path().display().to_string(),
        ..Default::default()
    }
    .resolve()
    .unwrap();
    ShortcutDispatcher::new(DeployPipeline::new(config, compiler))
}

/// Collects progress text the way a host would.
#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<String>>,
}

impl Recorder {
    fn record(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

// ============================================================================
// Test: Successful builds
// ============================================================================

#[tokio::test]
async fn test_pages_shortcut_builds_and_reports() {
    let dir = project();
    let compiler = Arc::new(FakeCompiler::default());
    let dispatcher = dispatcher(&dir, compiler.clone());
    let recorder = Recorder::default();
    let progress = |message: &str| recorder.record(message);

    dispatcher.change("f", Some(&progress)).await;

    assert_eq!(
        recorder.messages(),
        vec![
            "Starting Pages build...",
            "tinygo build (M)",
            "Pages build completed successfully",
        ]
    );
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("deploy/cloudflare/_worker.js").exists());
    assert!(dir.path().join("deploy/cloudflare/worker.wasm").exists());
}

#[tokio::test]
async fn test_workers_shortcut_builds_and_reports() {
    let dir = project();
    let dispatcher = dispatcher(&dir, Arc::new(FakeCompiler::default()));
    let recorder = Recorder::default();
    let progress = |message: &str| recorder.record(message);

    dispatcher.change("w", Some(&progress)).await;

    let messages = recorder.messages();
    assert_eq!(messages.first().unwrap(), "Starting Workers build...");
    assert_eq!(messages.last().unwrap(), "Workers build completed successfully");
    let script =
        std::fs::read_to_string(dir.path().join("deploy/cloudflare/_worker.js")).unwrap();
    assert!(script.contains("async scheduled("));
}

#[tokio::test]
async fn test_build_without_progress_callback() {
    let dir = project();
    let compiler = Arc::new(FakeCompiler::default());
    let dispatcher = dispatcher(&dir, compiler.clone());

    dispatcher.change("w", None).await;

    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("deploy/cloudflare/_worker.js").exists());
}

// ============================================================================
// Test: Failures
// ============================================================================

#[tokio::test]
async fn test_compile_failure_is_reported_once() {
    let dir = project();
    let compiler = Arc::new(FakeCompiler {
        fail_with: Some("undefined: main".into()),
        ..Default::default()
    });
    let dispatcher = dispatcher(&dir, compiler.clone());
    let recorder = Recorder::default();
    let progress = |message: &str| recorder.record(message);

    dispatcher.change("f", Some(&progress)).await;

    let messages = recorder.messages();
    let last = messages.last().unwrap();
    assert!(last.starts_with("Pages build failed: "));
    assert!(last.contains("undefined: main"));
    assert!(!messages.iter().any(|m| m.contains("completed successfully")));
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("deploy").exists());
}

#[tokio::test]
async fn test_missing_input_is_reported() {
    let dir = project();
    let compiler = Arc::new(FakeCompiler::default());
    let dispatcher = dispatcher(&dir, compiler.clone());
    std::fs::remove_file(dir.path().join("web/main.go")).unwrap();
    let recorder = Recorder::default();
    let progress = |message: &str| recorder.record(message);

    dispatcher.change("w", Some(&progress)).await;

    let messages = recorder.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].starts_with("Workers build failed: "));
    assert!(messages[1].contains("main.go"));
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_shortcut_is_a_no_op() {
    let dir = project();
    let compiler = Arc::new(FakeCompiler::default());
    let dispatcher = dispatcher(&dir, compiler.clone());
    let recorder = Recorder::default();
    let progress = |message: &str| recorder.record(message);

    tokio_test::block_on(dispatcher.change("x", Some(&progress)));
    tokio_test::block_on(dispatcher.change("x", None));

    assert_eq!(recorder.messages(), vec!["Unknown shortcut: x"]);
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("deploy").exists());
}

// ============================================================================
// Test: Serialized builds
// ============================================================================

#[tokio::test]
async fn test_concurrent_shortcuts_do_not_overlap() {
    let dir = project();
    let compiler = Arc::new(FakeCompiler {
        delay: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    let dispatcher = dispatcher(&dir, compiler.clone());
    let recorder = Recorder::default();
    let progress = |message: &str| recorder.record(message);

    tokio::join!(
        dispatcher.change("f", Some(&progress)),
        dispatcher.change("w", Some(&progress)),
    );

    assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
    assert_eq!(compiler.max_running.load(Ordering::SeqCst), 1);

    let completed = recorder
        .messages()
        .iter()
        .filter(|m| m.ends_with("build completed successfully"))
        .count();
    assert_eq!(completed, 2);
}
