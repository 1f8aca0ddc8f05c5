//! Configuration file structures for edge-deploy.
//!
//! The entry command optionally reads an `edge-deploy.toml` file. Values
//! from the file are overridden by command-line flags and environment
//! variables, and whatever is still empty falls back to the defaults
//! applied by [`BuildConfig::resolve`](crate::BuildConfig::resolve).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BuildConfig;

/// Conventional configuration file name in the project root.
pub const CONFIG_FILE_NAME: &str = "edge-deploy.toml";

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [build]
/// input_dir = "web"
/// output_dir = "deploy/cloudflare"
/// main_input_file = "main.go"
/// output_wasm_file = "worker.wasm"
/// api_route_prefix = "/api/"
/// compiler_mode = "S"
/// compile_timeout_secs = 40
/// compiler_args = ["-tags=edge"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Build configuration.
    #[serde(default)]
    pub build: BuildConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
