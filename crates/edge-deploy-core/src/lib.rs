//! Compiler driving and artifact assembly for edge-deploy.
//!
//! This crate turns a Go entry point into Cloudflare deployment artifacts:
//! - [`CompilerAdapter`]: external compiler capability with streamed progress
//! - [`ModeController`]: profile selection and progress delivery
//! - [`TinyGoAdapter`]: default adapter driving `go` and `tinygo`
//! - [`ArtifactAssembler`]: ordered fragment concatenation and substitution
//! - [`DeployPipeline`]: the whole chain for one build target
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    DeployPipeline                       │
//! │  (ResolvedConfig, one build at a time)                  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ModeController                        │
//! │  - "L" / "M" / "S" -> CompilerMode                      │
//! │  - progress listener joined with the adapter            │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                 CompilerAdapter                         │
//! │  (TinyGoAdapter: child process, hard timeout)           │
//! │  -> wasm bytes + wasm_exec.js shim                      │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                 ArtifactAssembler                       │
//! │  shim + runtime loader + worker logic -> _worker.js     │
//! │  wasm bytes -> <output_wasm_file>                       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod assembler;
pub mod compiler;
pub mod controller;
pub mod pipeline;
pub mod templates;
pub mod tinygo;

pub use assembler::{Artifact, ArtifactAssembler, WORKER_SCRIPT_NAME};
pub use compiler::{CompileOutput, CompilerAdapter, ProgressEvent, ProgressSender};
pub use controller::{ControllerState, ModeController, ProgressSink};
pub use pipeline::DeployPipeline;
pub use tinygo::TinyGoAdapter;
