//! Interactive host integration for edge-deploy.
//!
//! Development hosts expose build actions as single-key shortcuts. This
//! crate implements the handler side of that contract.
//!
//! # Interfaces
//!
//! - [`dispatcher`]: the [`HostHandler`] contract and [`ShortcutDispatcher`]
//! - [`progress`]: progress text delivered to the host and to `tracing`
//!
//! # Behavior
//!
//! 1. **Routing**: the configured Pages and Workers shortcuts select a
//!    [`BuildTarget`](edge_deploy_common::BuildTarget); anything else is
//!    reported as unknown.
//! 2. **Serialization**: builds triggered through one dispatcher never
//!    overlap.
//! 3. **Reporting**: start, compiler output, and the final outcome are sent
//!    to the host callback. Failures are reported, never returned.

pub mod dispatcher;
pub mod progress;

pub use dispatcher::{HOST_LABEL, HOST_NAME, HostHandler, ShortcutDispatcher};
pub use progress::{HostProgress, ProgressReporter, ReportLevel};
