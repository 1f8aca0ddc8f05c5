//! Error types for edge-deploy.
//!
//! Every failure in a build invocation is terminal: nothing in the
//! workspace retries. [`DeployError`] carries enough context for the entry
//! command to print a useful message and for an interactive host to show
//! it through its progress callback.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level build errors.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Required input is missing or the configuration is inconsistent.
    ///
    /// Raised before any build step runs.
    #[error("Invalid configuration: {reason}")]
    ConfigValidation {
        /// Description of the validation failure.
        reason: String,
    },

    /// The compiler profile identifier is not one of `L`, `M`, `S`.
    #[error("Invalid compiler mode: '{mode}' (expected one of L, M, S)")]
    InvalidMode {
        /// The identifier that was rejected.
        mode: String,
    },

    /// The compiler adapter reported a failure.
    #[error("Compilation failed: {reason}")]
    CompileFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The compiler adapter exceeded its internal time ceiling.
    #[error("Compilation timed out after {timeout_secs}s")]
    CompileTimeout {
        /// The ceiling that was exceeded, in seconds.
        timeout_secs: u64,
    },

    /// A script fragment could not be read.
    #[error("Failed to read template '{template}': {reason}")]
    TemplateRead {
        /// Asset key or path of the fragment.
        template: String,
        /// Why it was unavailable.
        reason: String,
    },

    /// A placeholder token survived substitution.
    #[error("Unresolved placeholder {token} in assembled script")]
    UnresolvedPlaceholder {
        /// The literal token left in the output.
        token: String,
    },

    /// An output file or directory could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Destination that failed.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Operation context wrapped around an inner failure.
    #[error("Failed to generate {artifact}: {source}")]
    Artifact {
        /// The artifact or step that was being produced.
        artifact: String,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// Create a new `ConfigValidation` error.
    pub fn config_validation(reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidMode` error.
    pub fn invalid_mode(mode: impl Into<String>) -> Self {
        Self::InvalidMode { mode: mode.into() }
    }

    /// Create a new `CompileFailed` error.
    pub fn compile_failed(reason: impl Into<String>) -> Self {
        Self::CompileFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `TemplateRead` error.
    pub fn template_read(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateRead {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Write` error.
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with the artifact that was being produced.
    #[must_use]
    pub fn context(self, artifact: impl Into<String>) -> Self {
        Self::Artifact {
            artifact: artifact.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any `Artifact` wrappers.
    pub fn root_cause(&self) -> &DeployError {
        let mut current = self;
        while let Self::Artifact { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns `true` if the build was rejected before any build step ran.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::ConfigValidation { .. } | Self::InvalidMode { .. }
        )
    }

    /// Returns `true` if the compiler exceeded its time ceiling.
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::CompileTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeployError::invalid_mode("X");
        assert_eq!(
            err.to_string(),
            "Invalid compiler mode: 'X' (expected one of L, M, S)"
        );

        let err = DeployError::CompileTimeout { timeout_secs: 40 };
        assert_eq!(err.to_string(), "Compilation timed out after 40s");
    }

    #[test]
    fn test_context_wraps_message() {
        let err = DeployError::compile_failed("exit status 2").context("_worker.js");
        assert_eq!(
            err.to_string(),
            "Failed to generate _worker.js: Compilation failed: exit status 2"
        );
    }

    #[test]
    fn test_root_cause_unwraps_nested_context() {
        let err = DeployError::CompileTimeout { timeout_secs: 40 }
            .context("worker.wasm")
            .context("pages build");

        assert!(matches!(
            err.root_cause(),
            DeployError::CompileTimeout { timeout_secs: 40 }
        ));
        assert!(err.is_timeout());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_is_config_error() {
        assert!(DeployError::config_validation("missing").is_config_error());
        assert!(DeployError::invalid_mode("Q").is_config_error());
        assert!(!DeployError::compile_failed("boom").is_config_error());
    }

    #[test]
    fn test_write_error_mentions_path() {
        let err = DeployError::write(
            "deploy/_worker.js",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("deploy/_worker.js"));
    }
}
