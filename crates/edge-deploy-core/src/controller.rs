//! Compiler mode controller.
//!
//! [`ModeController`] turns a profile identifier into an adapter call and
//! owns the listener side of the progress stream. The caller sees a single
//! awaited result; every progress event has been handed to the sink by the
//! time that result is returned.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use edge_deploy_common::{CompilerMode, DeployError};

use crate::compiler::{
    CompileOutput, CompilerAdapter, PROGRESS_CHANNEL_CAPACITY, ProgressEvent, ProgressSender,
};

/// Receives progress events, in order, on the caller's side.
pub type ProgressSink<'a> = &'a (dyn Fn(&ProgressEvent) + Send + Sync);

/// Lifecycle of the most recent compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No compilation has been requested yet.
    Idle,
    /// The adapter is running.
    Invoking,
    /// The last compilation succeeded.
    Completed,
    /// The last compilation failed.
    Failed,
}

/// Drives a [`CompilerAdapter`] through the mode/progress protocol.
pub struct ModeController {
    adapter: Arc<dyn CompilerAdapter>,
    state: Mutex<ControllerState>,
}

impl ModeController {
    /// Create a controller around an adapter.
    pub fn new(adapter: Arc<dyn CompilerAdapter>) -> Self {
        Self {
            adapter,
            state: Mutex::new(ControllerState::Idle),
        }
    }

    /// State after the most recent call.
    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    /// Compile using a profile identifier (`L`, `M`, `S`).
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidMode`] for unknown identifiers without
    /// calling the adapter or emitting progress. Adapter errors, including
    /// [`DeployError::CompileTimeout`], are returned unchanged.
    pub async fn compile(
        &self,
        mode: &str,
        sink: ProgressSink<'_>,
    ) -> Result<CompileOutput, DeployError> {
        let mode: CompilerMode = mode.parse()?;
        self.compile_mode(mode, sink).await
    }

    /// Compile using an already parsed profile.
    #[instrument(skip(self, mode, sink), fields(adapter = self.adapter.name(), mode = %mode))]
    pub async fn compile_mode(
        &self,
        mode: CompilerMode,
        sink: ProgressSink<'_>,
    ) -> Result<CompileOutput, DeployError> {
        *self.state.lock() = ControllerState::Invoking;
        let start = Instant::now();

        debug!(profile = mode.profile(), "Invoking compiler");

        let (progress, mut events) = ProgressSender::channel(PROGRESS_CHANNEL_CAPACITY);

        // The stream ends when the adapter drops its sender, so joining both
        // guarantees every event is delivered before the result is observed.
        let listener = async {
            let mut delivered = 0u64;
            while let Some(event) = events.recv().await {
                sink(&event);
                delivered += 1;
            }
            delivered
        };

        let (result, delivered) = tokio::join!(self.adapter.compile(mode, progress), listener);
        let result = result.and_then(|output| output.validate().map(|()| output));

        let duration = start.elapsed();

        match &result {
            Ok(output) => {
                *self.state.lock() = ControllerState::Completed;
                info!(
                    duration_ms = duration.as_millis(),
                    wasm_bytes = output.wasm.len(),
                    progress_events = delivered,
                    "Compilation completed"
                );
            }
            Err(err) => {
                *self.state.lock() = ControllerState::Failed;
                warn!(
                    duration_ms = duration.as_millis(),
                    progress_events = delivered,
                    error = %err,
                    "Compilation failed"
                );
            }
        }

        result
    }
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("adapter", &self.adapter.name())
            .field("state", &self.state())
            .finish()
    }
}
