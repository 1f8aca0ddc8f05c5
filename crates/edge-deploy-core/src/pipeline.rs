//! End-to-end build pipeline.
//!
//! [`DeployPipeline`] ties a resolved configuration to a compiler adapter
//! and produces the artifacts for either build target. Pages and Workers
//! share the configuration and the compiler; each owns its worker-logic
//! template.

use std::sync::Arc;

use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use edge_deploy_common::{BuildTarget, DeployError, ResolvedConfig};

use crate::assembler::{Artifact, ArtifactAssembler};
use crate::compiler::CompilerAdapter;
use crate::controller::{ModeController, ProgressSink};
use crate::tinygo::TinyGoAdapter;

/// Compiles the Go entry point and writes deployable artifacts.
#[derive(Debug)]
pub struct DeployPipeline {
    config: ResolvedConfig,
    controller: ModeController,
}

impl DeployPipeline {
    /// Create a pipeline with a custom compiler adapter.
    pub fn new(config: ResolvedConfig, adapter: Arc<dyn CompilerAdapter>) -> Self {
        Self {
            config,
            controller: ModeController::new(adapter),
        }
    }

    /// Create a pipeline using the Go/TinyGo toolchains.
    pub fn with_tinygo(config: ResolvedConfig) -> Self {
        let adapter = Arc::new(TinyGoAdapter::new(&config));
        Self::new(config, adapter)
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The compiler controller.
    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    /// Generate `_worker.js` and the binary for Pages Advanced Mode.
    ///
    /// # Errors
    ///
    /// See [`DeployPipeline::build`].
    pub async fn generate_pages_files(
        &self,
        sink: ProgressSink<'_>,
    ) -> Result<Artifact, DeployError> {
        self.build(BuildTarget::PagesAdvancedMode, sink).await
    }

    /// Generate `_worker.js` and the binary for Workers.
    ///
    /// # Errors
    ///
    /// See [`DeployPipeline::build`].
    pub async fn generate_worker_files(
        &self,
        sink: ProgressSink<'_>,
    ) -> Result<Artifact, DeployError> {
        self.build(BuildTarget::Workers, sink).await
    }

    /// Build a target into the configured output directory.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ConfigValidation`] if the main input file has
    /// disappeared since resolution, before anything is compiled. Compiler
    /// and assembly failures are returned wrapped with the failing step.
    pub async fn build(
        &self,
        target: BuildTarget,
        sink: ProgressSink<'_>,
    ) -> Result<Artifact, DeployError> {
        self.run(target, None, sink).await
    }

    /// Build a target into `output_dir` instead of the configured directory.
    ///
    /// The pipeline's configuration is unchanged afterwards, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Same as [`DeployPipeline::build`].
    pub async fn build_in(
        &self,
        target: BuildTarget,
        output_dir: &str,
        sink: ProgressSink<'_>,
    ) -> Result<Artifact, DeployError> {
        self.run(target, Some(output_dir), sink).await
    }

    async fn run(
        &self,
        target: BuildTarget,
        output_dir: Option<&str>,
        sink: ProgressSink<'_>,
    ) -> Result<Artifact, DeployError> {
        let build_id = Uuid::new_v4();
        let span = info_span!("build", %build_id, build_target = %target);

        async {
            self.config.ensure_input_exists()?;

            let mode = self.config.compiler_mode();
            self.config.log(&format!(
                "Building {target} artifacts ({} profile)",
                mode.profile()
            ));

            let output = self
                .controller
                .compile_mode(mode, sink)
                .await
                .map_err(|e| e.context(self.config.output_wasm_file()))?;

            let assembler = ArtifactAssembler::new(&self.config);
            let artifact = match output_dir {
                Some(dir) => assembler.assemble_in(dir, target, &output).await?,
                None => assembler.assemble(target, &output).await?,
            };

            self.config.log(&format!(
                "{target} artifacts written to {}",
                artifact.script_path.display()
            ));
            info!(
                script_bytes = artifact.script_bytes,
                wasm_bytes = artifact.wasm_bytes,
                "Build finished"
            );

            Ok(artifact)
        }
        .instrument(span)
        .await
    }
}
