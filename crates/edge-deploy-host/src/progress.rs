//! Progress reporting toward the interactive host.
//!
//! Every message emitted while handling a shortcut is recorded through
//! `tracing` and, when the host supplied one, passed to its progress
//! callback. Hosts that pass no callback still get the log output.

use tracing::{debug, error, info, warn};

/// Callback the host passes to receive progress text.
pub type HostProgress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Severity of a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    /// Forwarded compiler output.
    Debug,
    /// Build lifecycle messages.
    Info,
    /// Shortcuts that matched nothing.
    Warn,
    /// Failed builds.
    Error,
}

/// Reports messages for one shortcut invocation.
pub struct ProgressReporter<'a> {
    shortcut: &'a str,
    progress: Option<HostProgress<'a>>,
}

impl<'a> ProgressReporter<'a> {
    /// Create a reporter for `shortcut`.
    pub fn new(shortcut: &'a str, progress: Option<HostProgress<'a>>) -> Self {
        Self { shortcut, progress }
    }

    /// Whether the host supplied a callback.
    pub fn has_callback(&self) -> bool {
        self.progress.is_some()
    }

    /// Report a message at the given level.
    pub fn report(&self, level: ReportLevel, message: &str) {
        let shortcut = self.shortcut;
        match level {
            ReportLevel::Debug => debug!(shortcut, host_message = true, "{}", message),
            ReportLevel::Info => info!(shortcut, host_message = true, "{}", message),
            ReportLevel::Warn => warn!(shortcut, host_message = true, "{}", message),
            ReportLevel::Error => error!(shortcut, host_message = true, "{}", message),
        }

        if let Some(progress) = self.progress {
            progress(message);
        }
    }

    pub fn debug(&self, message: &str) {
        self.report(ReportLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.report(ReportLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.report(ReportLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.report(ReportLevel::Error, message);
    }
}

impl std::fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("shortcut", &self.shortcut)
            .field("has_callback", &self.has_callback())
            .finish()
    }
}
