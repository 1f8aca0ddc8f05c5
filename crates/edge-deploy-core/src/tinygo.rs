//! Default compiler adapter driving the Go and TinyGo toolchains.
//!
//! | Mode | Toolchain | Flags                                     |
//! |------|-----------|-------------------------------------------|
//! | `L`  | `go`      | `GOOS=js GOARCH=wasm go build`            |
//! | `M`  | `tinygo`  | `-target wasm -opt=1`                     |
//! | `S`  | `tinygo`  | `-target wasm -opt=z -no-debug -panic=trap` |
//!
//! Compiler output lines are streamed as progress events. The whole
//! invocation, including the shim lookup, runs under a single deadline;
//! when it expires the child process is killed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use edge_deploy_common::{CompilerMode, DeployError, ResolvedConfig};

use crate::compiler::{CompileOutput, CompilerAdapter, ProgressSender};

/// Number of trailing diagnostic lines kept for error messages.
const DIAGNOSTIC_TAIL: usize = 10;

/// File name of the shim shipped with both toolchains.
const SHIM_FILE: &str = "wasm_exec.js";

/// Which toolchain a profile runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toolchain {
    Go,
    TinyGo,
}

impl Toolchain {
    fn for_mode(mode: CompilerMode) -> Self {
        match mode {
            CompilerMode::Fast => Self::Go,
            CompilerMode::Minimal | CompilerMode::Production => Self::TinyGo,
        }
    }
}

/// Compiler adapter invoking `go` or `tinygo` as a child process.
#[derive(Debug, Clone)]
pub struct TinyGoAdapter {
    config: ResolvedConfig,
    timeout: Duration,
    go_binary: String,
    tinygo_binary: String,
}

impl TinyGoAdapter {
    /// Create an adapter for the configured entry point.
    ///
    /// The configuration's argument provider is consulted on every
    /// compilation.
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            config: config.clone(),
            timeout: config.compile_timeout(),
            go_binary: "go".to_string(),
            tinygo_binary: "tinygo".to_string(),
        }
    }

    /// Use specific toolchain executables instead of `go` and `tinygo`.
    #[must_use]
    pub fn with_toolchain(mut self, go: impl Into<String>, tinygo: impl Into<String>) -> Self {
        self.go_binary = go.into();
        self.tinygo_binary = tinygo.into();
        self
    }

    /// Override the compilation ceiling.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The compilation ceiling.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn binary(&self, toolchain: Toolchain) -> &str {
        match toolchain {
            Toolchain::Go => &self.go_binary,
            Toolchain::TinyGo => &self.tinygo_binary,
        }
    }

    /// Arguments passed to the toolchain's `build` command.
    fn build_args(&self, mode: CompilerMode, output: &Path) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ];

        match mode {
            CompilerMode::Fast => {}
            CompilerMode::Minimal => {
                args.extend(["-target", "wasm", "-opt=1"].map(String::from));
            }
            CompilerMode::Production => {
                args.extend(
                    ["-target", "wasm", "-opt=z", "-no-debug", "-panic=trap"].map(String::from),
                );
            }
        }

        args.extend(self.config.compiler_arguments());
        args.push(self.config.main_input_file().to_string());
        args
    }

    fn build_command(&self, mode: CompilerMode, output: &Path) -> Command {
        let toolchain = Toolchain::for_mode(mode);
        let mut command = Command::new(self.binary(toolchain));
        command
            .args(self.build_args(mode, output))
            .current_dir(self.config.input_dir_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if toolchain == Toolchain::Go {
            command.env("GOOS", "js").env("GOARCH", "wasm");
        }

        command
    }

    /// Candidate shim locations under a toolchain root.
    fn shim_candidates(toolchain: Toolchain, root: &Path) -> Vec<PathBuf> {
        match toolchain {
            // Go 1.24 moved the shim from misc/wasm to lib/wasm.
            Toolchain::Go => vec![
                root.join("lib").join("wasm").join(SHIM_FILE),
                root.join("misc").join("wasm").join(SHIM_FILE),
            ],
            Toolchain::TinyGo => vec![root.join("targets").join(SHIM_FILE)],
        }
    }

    async fn toolchain_root(&self, toolchain: Toolchain) -> Result<PathBuf, DeployError> {
        let variable = match toolchain {
            Toolchain::Go => "GOROOT",
            Toolchain::TinyGo => "TINYGOROOT",
        };
        let binary = self.binary(toolchain);

        let output = Command::new(binary)
            .args(["env", variable])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DeployError::template_read(SHIM_FILE, format!("cannot run `{binary} env`: {e}"))
            })?;

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || root.is_empty() {
            return Err(DeployError::template_read(
                SHIM_FILE,
                format!("`{binary} env {variable}` did not report a toolchain root"),
            ));
        }

        Ok(PathBuf::from(root))
    }

    async fn read_shim(&self, toolchain: Toolchain) -> Result<String, DeployError> {
        let root = self.toolchain_root(toolchain).await?;

        for candidate in Self::shim_candidates(toolchain, &root) {
            match tokio::fs::read_to_string(&candidate).await {
                Ok(shim) => {
                    debug!(path = %candidate.display(), "Shim loaded");
                    return Ok(shim);
                }
                Err(e) => debug!(path = %candidate.display(), error = %e, "Shim not found here"),
            }
        }

        Err(DeployError::template_read(
            SHIM_FILE,
            format!("not found under {}", root.display()),
        ))
    }

    async fn run(
        &self,
        mode: CompilerMode,
        progress: &mut ProgressSender,
    ) -> Result<CompileOutput, DeployError> {
        let toolchain = Toolchain::for_mode(mode);
        let binary = self.binary(toolchain);
        let scratch = ScratchFile::new();

        progress
            .send(format!(
                "Compiling {} with {binary} ({} profile)",
                self.config.main_input_file(),
                mode.profile()
            ))
            .await;

        let mut child = self
            .build_command(mode, scratch.path())
            .spawn()
            .map_err(|e| DeployError::compile_failed(format!("cannot start {binary}: {e}")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdout = stdout.map(|s| BufReader::new(s).lines());
        let mut stderr = stderr.map(|s| BufReader::new(s).lines());
        let mut diagnostics: Vec<String> = Vec::new();

        loop {
            tokio::select! {
                line = next_line(&mut stdout), if stdout.is_some() => match line {
                    Some(line) => progress.send(line).await,
                    None => stdout = None,
                },
                line = next_line(&mut stderr), if stderr.is_some() => match line {
                    Some(line) => {
                        progress.send(line.clone()).await;
                        diagnostics.push(line);
                    }
                    None => stderr = None,
                },
                else => break,
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DeployError::compile_failed(format!("{binary} did not exit: {e}")))?;

        if !status.success() {
            let tail_start = diagnostics.len().saturating_sub(DIAGNOSTIC_TAIL);
            let tail = diagnostics[tail_start..].join("\n");
            return Err(DeployError::compile_failed(if tail.is_empty() {
                format!("{binary} exited with {status}")
            } else {
                format!("{binary} exited with {status}:\n{tail}")
            }));
        }

        let wasm = tokio::fs::read(scratch.path()).await.map_err(|e| {
            DeployError::compile_failed(format!("{binary} produced no binary: {e}"))
        })?;

        progress
            .send(format!("Reading {SHIM_FILE} from {binary}"))
            .await;
        let shim = self.read_shim(toolchain).await?;

        progress
            .send(format!("Compiled {} bytes", wasm.len()))
            .await;

        Ok(CompileOutput::new(wasm, shim))
    }
}

#[async_trait]
impl CompilerAdapter for TinyGoAdapter {
    fn name(&self) -> &str {
        "tinygo"
    }

    #[instrument(skip(self, mode, progress), fields(mode = %mode, timeout_ms = self.timeout.as_millis()))]
    async fn compile(
        &self,
        mode: CompilerMode,
        mut progress: ProgressSender,
    ) -> Result<CompileOutput, DeployError> {
        let start = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, self.run(mode, &mut progress)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    duration_ms = start.elapsed().as_millis(),
                    "Compilation exceeded its time limit, child killed"
                );
                let timeout_secs = whole_seconds(self.timeout);
                progress
                    .send(format!("Compilation aborted after {timeout_secs}s"))
                    .await;
                return Err(DeployError::CompileTimeout { timeout_secs });
            }
        };

        if result.is_ok() {
            info!(duration_ms = start.elapsed().as_millis(), "Toolchain finished");
        }
        result
    }
}

/// Seconds in `duration`, rounded up so sub-second limits never read as 0s.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Read the next line of a child stream; `None` at end or on error.
async fn next_line<R>(lines: &mut Option<tokio::io::Lines<R>>) -> Option<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

/// Temporary output path, removed on drop.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new() -> Self {
        Self {
            path: std::env::temp_dir().join(format!("edge-deploy-{}.wasm", Uuid::new_v4())),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Absent when the compiler failed early.
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use edge_deploy_common::BuildConfig;

    use super::*;

    fn adapter(dir: &tempfile::TempDir) -> TinyGoAdapter {
        std::fs::create_dir_all(dir.path().join("web")).unwrap();
        std::fs::write(dir.path().join("web/main.go"), "package main\n").unwrap();
        let config = BuildConfig {
            root_dir: dir.path().display().to_string(),
            compiler_args: vec!["-tags=edge".into()],
            ..Default::default()
        }
        .resolve()
        .unwrap();
        TinyGoAdapter::new(&config)
    }

    #[test]
    fn test_toolchain_per_mode() {
        assert_eq!(Toolchain::for_mode(CompilerMode::Fast), Toolchain::Go);
        assert_eq!(Toolchain::for_mode(CompilerMode::Minimal), Toolchain::TinyGo);
        assert_eq!(Toolchain::for_mode(CompilerMode::Production), Toolchain::TinyGo);
    }

    #[test]
    fn test_build_args_per_mode() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter(&dir);
        let out = Path::new("/tmp/out.wasm");

        assert_eq!(
            adapter.build_args(CompilerMode::Fast, out),
            vec!["build", "-o", "/tmp/out.wasm", "-tags=edge", "main.go"]
        );
        assert_eq!(
            adapter.build_args(CompilerMode::Minimal, out),
            vec![
                "build",
                "-o",
                "/tmp/out.wasm",
                "-target",
                "wasm",
                "-opt=1",
                "-tags=edge",
                "main.go"
            ]
        );

        let production = adapter.build_args(CompilerMode::Production, out);
        assert!(production.contains(&"-opt=z".to_string()));
        assert!(production.contains(&"-no-debug".to_string()));
        assert_eq!(production.last().map(String::as_str), Some("main.go"));
    }

    #[test]
    fn test_argument_provider_runs_per_build() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("web")).unwrap();
        std::fs::write(dir.path().join("web/main.go"), "package main\n").unwrap();

        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let config = BuildConfig {
            root_dir: dir.path().display().to_string(),
            ..Default::default()
        }
        .with_compiling_arguments(move || {
            vec![format!("-tags=v{}", counter.fetch_add(1, Ordering::SeqCst))]
        })
        .resolve()
        .unwrap();
        let adapter = TinyGoAdapter::new(&config);
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        let out = Path::new("/tmp/out.wasm");
        let first = adapter.build_args(CompilerMode::Minimal, out);
        let second = adapter.build_args(CompilerMode::Minimal, out);

        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(first.contains(&"-tags=v0".to_string()));
        assert!(second.contains(&"-tags=v1".to_string()));
        assert_eq!(second.last().map(String::as_str), Some("main.go"));
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_secs(40)), 40);
        assert_eq!(whole_seconds(Duration::from_millis(300)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(whole_seconds(Duration::ZERO), 0);
    }

    #[test]
    fn test_shim_candidates() {
        let root = Path::new("/usr/local/go");
        let go = TinyGoAdapter::shim_candidates(Toolchain::Go, root);
        assert_eq!(go[0], root.join("lib/wasm/wasm_exec.js"));
        assert_eq!(go[1], root.join("misc/wasm/wasm_exec.js"));

        let tinygo = TinyGoAdapter::shim_candidates(Toolchain::TinyGo, Path::new("/opt/tinygo"));
        assert_eq!(tinygo, vec![PathBuf::from("/opt/tinygo/targets/wasm_exec.js")]);
    }

    #[test]
    fn test_timeout_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter(&dir);
        assert_eq!(adapter.timeout(), Duration::from_secs(40));
        assert_eq!(
            adapter.with_timeout(Duration::from_secs(5)).timeout(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let scratch = ScratchFile::new();
        let path = scratch.path().to_path_buf();
        std::fs::write(&path, b"\0asm").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter(&dir).with_toolchain(
            "edge-deploy-test-no-such-go",
            "edge-deploy-test-no-such-tinygo",
        );
        let (progress, mut rx) = ProgressSender::channel(8);

        let err = adapter
            .compile(CompilerMode::Production, progress)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::CompileFailed { .. }));
        assert!(err.to_string().contains("edge-deploy-test-no-such-tinygo"));
        let first = rx.recv().await.unwrap();
        assert!(first.message.starts_with("Compiling main.go"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_toolchain_times_out() {
        let dir = tempfile::tempdir().unwrap();
        // `sleep build -o ...` fails fast, so use a script that ignores its arguments.
        let script = dir.path().join("slow-tinygo.sh");
        std::fs::write(&script, "#!/bin/sh\necho starting >&2\nsleep 5\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let adapter = adapter(&dir)
            .with_toolchain("go", script.display().to_string())
            .with_timeout(Duration::from_millis(300));
        let (progress, mut rx) = ProgressSender::channel(8);

        let err = adapter
            .compile(CompilerMode::Minimal, progress)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::CompileTimeout { timeout_secs: 1 }), "got {err}");
        let mut messages = Vec::new();
        while let Some(event) = rx.recv().await {
            messages.push(event.message);
        }
        assert!(messages.iter().any(|m| m == "Compilation aborted after 1s"));
    }
}
