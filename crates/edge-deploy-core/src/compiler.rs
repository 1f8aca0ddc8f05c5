//! Compiler adapter protocol.
//!
//! A [`CompilerAdapter`] turns the Go entry point into a WebAssembly binary
//! plus the JavaScript shim that boots it. While it works it reports
//! [`ProgressEvent`]s through a [`ProgressSender`]; the sender is handed
//! over by value so that the adapter finishing also closes the stream.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use edge_deploy_common::{CompilerMode, DeployError};

/// Capacity of the bounded progress channel between adapter and listener.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// A single progress message emitted during compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position in the invocation's stream, starting at 0.
    pub sequence: u64,

    /// Human-readable message.
    pub message: String,
}

/// Sending half of a progress stream.
///
/// Numbers events in emission order. Sending waits while the channel is
/// full, so a slow listener applies back-pressure instead of losing events.
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
    next_sequence: u64,
}

impl ProgressSender {
    /// Create a bounded progress channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                next_sequence: 0,
            },
            rx,
        )
    }

    /// Emit a progress message.
    ///
    /// A listener that has gone away is not an error for the adapter; the
    /// message is dropped.
    pub async fn send(&mut self, message: impl Into<String>) {
        let event = ProgressEvent {
            sequence: self.next_sequence,
            message: message.into(),
        };
        self.next_sequence += 1;

        if self.tx.send(event).await.is_err() {
            trace!("Progress listener closed, dropping message");
        }
    }

    /// Number of messages emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }
}

/// Result of a successful compilation.
#[derive(Clone, PartialEq, Eq)]
pub struct CompileOutput {
    /// The WebAssembly binary.
    pub wasm: Vec<u8>,

    /// JavaScript shim (`wasm_exec.js`) matching the toolchain.
    pub shim: String,
}

impl CompileOutput {
    /// Create a new compile output.
    pub fn new(wasm: impl Into<Vec<u8>>, shim: impl Into<String>) -> Self {
        Self {
            wasm: wasm.into(),
            shim: shim.into(),
        }
    }

    /// Check that the adapter produced something deployable.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::CompileFailed`] if the binary lacks the Wasm
    /// magic number or the shim is empty.
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.wasm.len() < 8 {
            return Err(DeployError::compile_failed("Invalid Wasm: file too small"));
        }

        // Check magic number: \0asm
        if &self.wasm[0..4] != b"\0asm" {
            return Err(DeployError::compile_failed("Invalid Wasm: bad magic number"));
        }

        if self.shim.trim().is_empty() {
            return Err(DeployError::compile_failed("compiler returned an empty shim"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompileOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOutput")
            .field("wasm_bytes", &self.wasm.len())
            .field("shim_bytes", &self.shim.len())
            .finish()
    }
}

/// External compiler capability.
///
/// Implementations enforce their own time ceiling and report exceeding it
/// as [`DeployError::CompileTimeout`]. They must not retry.
#[async_trait]
pub trait CompilerAdapter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Compile under the given profile, streaming progress to `progress`.
    async fn compile(
        &self,
        mode: CompilerMode,
        progress: ProgressSender,
    ) -> Result<CompileOutput, DeployError>;
}
