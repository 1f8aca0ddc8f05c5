//! Deployable artifact assembly.
//!
//! The worker script is built from three fragments, in this order:
//!
//! 1. the compiler's shim, which defines `Go`
//! 2. the runtime loader, which defines `loadModule` and `createRuntimeContext`
//! 3. the worker logic for the target, which calls all of the above
//!
//! Fragments are joined by a blank line and placeholders are substituted
//! afterwards. Reordering the fragments yields a script that fails at load
//! time on the edge.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use uuid::Uuid;

use edge_deploy_common::{BuildTarget, DeployError, ResolvedConfig};

use crate::compiler::CompileOutput;
use crate::templates;

/// File name of the generated entry script.
pub const WORKER_SCRIPT_NAME: &str = "_worker.js";

/// Separator placed between fragments.
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Files written by one assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Layout that was produced.
    pub target: BuildTarget,
    /// Path of `_worker.js`.
    pub script_path: PathBuf,
    /// Path of the Wasm binary.
    pub wasm_path: PathBuf,
    /// Size of the script in bytes.
    pub script_bytes: usize,
    /// Size of the binary in bytes.
    pub wasm_bytes: usize,
}

/// Writes `_worker.js` and the Wasm binary for a build target.
#[derive(Debug, Clone)]
pub struct ArtifactAssembler {
    config: ResolvedConfig,
}

impl ArtifactAssembler {
    /// Create an assembler writing into the configured output directory.
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// The configuration this assembler writes with.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Render the entry script without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::TemplateRead`] if a fragment is missing and
    /// [`DeployError::UnresolvedPlaceholder`] if a token survives.
    pub fn render_script(&self, target: BuildTarget, shim: &str) -> Result<String, DeployError> {
        let loader = templates::read(templates::RUNTIME_LOADER)?;
        let logic = templates::read(templates::worker_logic_key(target))?;

        let combined = [shim, loader, logic].join(FRAGMENT_SEPARATOR);
        templates::substitute(&combined, &self.config)
    }

    /// Assemble into the configured output directory.
    ///
    /// Both files are first staged next to their destinations, then moved
    /// into place: `_worker.js` first, the binary second. A failed write or
    /// a failed script move leaves any previous pair untouched.
    ///
    /// # Errors
    ///
    /// Rendering errors are returned before anything is written; write
    /// failures are [`DeployError::Write`] wrapped with the file name.
    #[instrument(skip(self, target, output), fields(build_target = %target, output_dir = %self.config.output_dir()))]
    pub async fn assemble(
        &self,
        target: BuildTarget,
        output: &CompileOutput,
    ) -> Result<Artifact, DeployError> {
        let script = self
            .render_script(target, &output.shim)
            .map_err(|e| e.context(WORKER_SCRIPT_NAME))?;

        let output_dir = self.config.output_dir_path();
        let script_path = output_dir.join(WORKER_SCRIPT_NAME);
        let wasm_path = output_dir.join(self.config.output_wasm_file());

        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| DeployError::write(&output_dir, e).context("output directory"))?;

        let wasm_name = self.config.output_wasm_file();
        let staged_script = staging_path(&output_dir, WORKER_SCRIPT_NAME);
        let staged_wasm = staging_path(&output_dir, wasm_name);

        let written = async {
            write_file(&staged_wasm, &output.wasm)
                .await
                .map_err(|e| e.context(wasm_name))?;
            write_file(&staged_script, script.as_bytes())
                .await
                .map_err(|e| e.context(WORKER_SCRIPT_NAME))?;
            publish(&staged_script, &script_path)
                .await
                .map_err(|e| e.context(WORKER_SCRIPT_NAME))?;
            publish(&staged_wasm, &wasm_path)
                .await
                .map_err(|e| e.context(wasm_name))
        }
        .await;

        if written.is_err() {
            discard(&staged_script).await;
            discard(&staged_wasm).await;
        }
        written?;

        info!(
            script = %script_path.display(),
            wasm = %wasm_path.display(),
            script_bytes = script.len(),
            wasm_bytes = output.wasm.len(),
            "Artifacts written"
        );

        Ok(Artifact {
            target,
            script_path,
            wasm_path,
            script_bytes: script.len(),
            wasm_bytes: output.wasm.len(),
        })
    }

    /// Assemble into `output_dir` instead of the configured directory.
    ///
    /// Works on a scoped view of the configuration; `self` is unchanged
    /// whether or not assembly succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`ArtifactAssembler::assemble`].
    pub async fn assemble_in(
        &self,
        output_dir: &str,
        target: BuildTarget,
        output: &CompileOutput,
    ) -> Result<Artifact, DeployError> {
        let scoped = Self::new(&self.config.with_output_dir(output_dir));
        debug!(
            configured = %self.config.output_dir(),
            scoped = %scoped.config.output_dir(),
            "Assembling into overridden output directory"
        );
        scoped.assemble(target, output).await
    }
}

/// Hidden sibling path a file is written to before being moved into place.
fn staging_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.{}.tmp", Uuid::new_v4()))
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), DeployError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| DeployError::write(path, e))
}

async fn publish(staged: &Path, destination: &Path) -> Result<(), DeployError> {
    tokio::fs::rename(staged, destination)
        .await
        .map_err(|e| DeployError::write(destination, e))
}

async fn discard(staged: &Path) {
    if let Err(e) = tokio::fs::remove_file(staged).await {
        debug!(path = %staged.display(), error = %e, "Staged file already gone");
    }
}
