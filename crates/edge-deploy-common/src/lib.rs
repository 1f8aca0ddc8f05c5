//! Common types, errors, and configuration for edge-deploy.
//!
//! This crate provides shared functionality used across the edge-deploy workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Build configuration and its resolution against defaults
//! - Build targets and compiler profiles

pub mod config;
pub mod config_file;
pub mod error;
pub mod target;

pub use config::{ArgumentProvider, BuildConfig, Logger, ResolvedConfig};
pub use config_file::{CONFIG_FILE_NAME, ConfigFile, ConfigFileError};
pub use error::DeployError;
pub use target::{BuildTarget, CompilerMode};
