//! Shortcut dispatch for interactive hosts.
//!
//! A host (a TUI, a dev server) registers handlers by name and forwards the
//! keys its user presses. [`ShortcutDispatcher`] maps the configured Pages
//! and Workers shortcuts to builds and reports every outcome back through
//! the host's progress callback. Errors never reach the host as values.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use edge_deploy_common::{BuildTarget, ResolvedConfig};
use edge_deploy_core::{DeployPipeline, ProgressEvent};

use crate::progress::{HostProgress, ProgressReporter};

/// Name the dispatcher registers under.
pub const HOST_NAME: &str = "edge-deploy";

/// Label shown next to the handler in the host.
pub const HOST_LABEL: &str = "Build Workers";

/// Contract between an interactive host and one of its handlers.
#[async_trait]
pub trait HostHandler: Send + Sync {
    /// Stable handler name.
    fn name(&self) -> &str;

    /// Human-readable label.
    fn label(&self) -> &str;

    /// Current value shown by the host.
    fn value(&self) -> &str;

    /// Shortcut key mapped to its description.
    fn shortcuts(&self) -> BTreeMap<String, String>;

    /// Handle a shortcut the user triggered.
    ///
    /// Outcomes are reported through `progress`; this never fails.
    async fn change(&self, value: &str, progress: Option<HostProgress<'_>>);
}

/// Routes build shortcuts to a [`DeployPipeline`].
///
/// Builds triggered through one dispatcher run one at a time.
#[derive(Debug)]
pub struct ShortcutDispatcher {
    pipeline: DeployPipeline,
    build_lock: Mutex<()>,
}

impl ShortcutDispatcher {
    pub fn new(pipeline: DeployPipeline) -> Self {
        Self {
            pipeline,
            build_lock: Mutex::new(()),
        }
    }

    /// Dispatcher backed by the Go/TinyGo toolchains.
    pub fn with_tinygo(config: ResolvedConfig) -> Self {
        Self::new(DeployPipeline::with_tinygo(config))
    }

    pub fn pipeline(&self) -> &DeployPipeline {
        &self.pipeline
    }

    /// Build target bound to `shortcut`, if any.
    pub fn target_for(&self, shortcut: &str) -> Option<BuildTarget> {
        let config = self.pipeline.config();
        if shortcut == config.pages_shortcut() {
            Some(BuildTarget::PagesAdvancedMode)
        } else if shortcut == config.workers_shortcut() {
            Some(BuildTarget::Workers)
        } else {
            None
        }
    }

    async fn run(&self, target: BuildTarget, reporter: &ProgressReporter<'_>) {
        let _guard = self.build_lock.lock().await;
        let label = target.label();

        reporter.info(&format!("Starting {label} build..."));

        let forward = |event: &ProgressEvent| reporter.debug(&event.message);
        match self.pipeline.build(target, &forward).await {
            Ok(artifact) => {
                debug!(
                    script = %artifact.script_path.display(),
                    wasm = %artifact.wasm_path.display(),
                    "Shortcut build wrote artifacts"
                );
                reporter.info(&format!("{label} build completed successfully"));
            }
            Err(err) => reporter.error(&format!("{label} build failed: {err}")),
        }
    }
}

#[async_trait]
impl HostHandler for ShortcutDispatcher {
    fn name(&self) -> &str {
        HOST_NAME
    }

    fn label(&self) -> &str {
        HOST_LABEL
    }

    fn value(&self) -> &str {
        ""
    }

    fn shortcuts(&self) -> BTreeMap<String, String> {
        let config = self.pipeline.config();
        BTreeMap::from([
            (
                config.pages_shortcut().to_string(),
                BuildTarget::PagesAdvancedMode.description().to_string(),
            ),
            (
                config.workers_shortcut().to_string(),
                BuildTarget::Workers.description().to_string(),
            ),
        ])
    }

    async fn change(&self, value: &str, progress: Option<HostProgress<'_>>) {
        let reporter = ProgressReporter::new(value, progress);

        match self.target_for(value) {
            Some(target) => {
                info!(shortcut = value, build_target = %target, "Shortcut triggered");
                self.run(target, &reporter).await;
            }
            None => reporter.warn(&format!("Unknown shortcut: {value}")),
        }
    }
}
