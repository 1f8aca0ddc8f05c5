//! Build configuration and its resolution.
//!
//! - [`BuildConfig`]: user-supplied, possibly partial configuration
//! - [`ResolvedConfig`]: fully populated, validated, immutable view
//!
//! Resolution replaces every empty field with its default and fails fast
//! when the main input file is missing, so no build work ever starts on an
//! invalid configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CompilerMode, DeployError};

/// Logger capability: receives human-readable build messages.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// Supplies extra compiler arguments at compile time.
pub type ArgumentProvider = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// User-supplied build configuration.
///
/// Every string field may be left empty; [`BuildConfig::resolve`] fills it
/// with the documented default. It can be loaded from the `[build]` table
/// of a TOML configuration file.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Project root; every other directory is relative to it.
    pub root_dir: String,

    /// Directory holding the Go entry point.
    pub input_dir: String,

    /// Directory receiving `_worker.js` and the Wasm binary.
    pub output_dir: String,

    /// Go entry point inside `input_dir`.
    pub main_input_file: String,

    /// File name of the emitted Wasm binary.
    pub output_wasm_file: String,

    /// Path prefix routed to the Wasm handlers in Pages mode.
    pub api_route_prefix: String,

    /// Compiler profile identifier (`L`, `M` or `S`).
    pub compiler_mode: String,

    /// Ceiling on a single compilation, in seconds. `0` selects the default.
    pub compile_timeout_secs: u64,

    /// Shortcut that triggers the Pages build in an interactive host.
    pub pages_shortcut: String,

    /// Shortcut that triggers the Workers build in an interactive host.
    pub workers_shortcut: String,

    /// Compiler arguments fixed in the configuration file.
    pub compiler_args: Vec<String>,

    /// Receives build messages. Defaults to a `tracing` forwarder.
    #[serde(skip)]
    pub logger: Option<Logger>,

    /// Computes additional compiler arguments for each compilation.
    #[serde(skip)]
    pub compiling_arguments: Option<ArgumentProvider>,
}

impl BuildConfig {
    /// Set the logger capability.
    #[must_use]
    pub fn with_logger(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Set the compiler argument provider.
    #[must_use]
    pub fn with_compiling_arguments(
        mut self,
        provider: impl Fn() -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.compiling_arguments = Some(Arc::new(provider));
        self
    }

    /// Merge with defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidMode`] for an unknown compiler mode and
    /// [`DeployError::ConfigValidation`] when:
    /// - the main input file does not exist at `<root>/<input>/<main>`
    /// - the output binary name contains a path separator
    /// - the API route prefix does not start with `/`
    /// - both shortcuts are the same
    pub fn resolve(&self) -> Result<ResolvedConfig, DeployError> {
        let output_wasm_file = or_default(&self.output_wasm_file, defaults::output_wasm_file);
        if output_wasm_file.contains(['/', '\\']) {
            return Err(DeployError::config_validation(format!(
                "output binary name must be a plain file name, got '{output_wasm_file}'"
            )));
        }

        let api_route_prefix = or_default(&self.api_route_prefix, defaults::api_route_prefix);
        if !api_route_prefix.starts_with('/') {
            return Err(DeployError::config_validation(format!(
                "API route prefix must start with '/', got '{api_route_prefix}'"
            )));
        }

        let pages_shortcut = or_default(&self.pages_shortcut, defaults::pages_shortcut);
        let workers_shortcut = or_default(&self.workers_shortcut, defaults::workers_shortcut);
        if pages_shortcut == workers_shortcut {
            return Err(DeployError::config_validation(format!(
                "Pages and Workers shortcuts must differ, both are '{pages_shortcut}'"
            )));
        }

        let compiler_mode: CompilerMode =
            or_default(&self.compiler_mode, defaults::compiler_mode).parse()?;

        let compile_timeout_secs = if self.compile_timeout_secs == 0 {
            defaults::compile_timeout_secs()
        } else {
            self.compile_timeout_secs
        };

        let resolved = ResolvedConfig {
            root_dir: normalize_dir(&self.root_dir, defaults::root_dir),
            input_dir: normalize_dir(&self.input_dir, defaults::input_dir),
            output_dir: normalize_dir(&self.output_dir, defaults::output_dir),
            main_input_file: or_default(&self.main_input_file, defaults::main_input_file),
            module_name: module_name(&output_wasm_file),
            output_wasm_file,
            api_route_prefix,
            compiler_mode,
            compile_timeout: Duration::from_secs(compile_timeout_secs),
            pages_shortcut,
            workers_shortcut,
            compiler_args: self.compiler_args.clone(),
            logger: self.logger.clone().unwrap_or_else(defaults::logger),
            compiling_arguments: self
                .compiling_arguments
                .clone()
                .unwrap_or_else(defaults::compiling_arguments),
        };

        resolved.ensure_input_exists()?;

        debug!(
            input = %resolved.input_path().display(),
            output_dir = %resolved.output_dir_path().display(),
            mode = %resolved.compiler_mode,
            "Build configuration resolved"
        );

        Ok(resolved)
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("root_dir", &self.root_dir)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("main_input_file", &self.main_input_file)
            .field("output_wasm_file", &self.output_wasm_file)
            .field("api_route_prefix", &self.api_route_prefix)
            .field("compiler_mode", &self.compiler_mode)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

/// Fully populated build configuration.
///
/// Immutable once built. Assembly into a directory other than the
/// configured one works on a [`ResolvedConfig::with_output_dir`] view, so
/// the caller's value never changes.
#[derive(Clone)]
pub struct ResolvedConfig {
    root_dir: String,
    input_dir: String,
    output_dir: String,
    main_input_file: String,
    output_wasm_file: String,
    module_name: String,
    api_route_prefix: String,
    compiler_mode: CompilerMode,
    compile_timeout: Duration,
    pages_shortcut: String,
    workers_shortcut: String,
    compiler_args: Vec<String>,
    logger: Logger,
    compiling_arguments: ArgumentProvider,
}

impl ResolvedConfig {
    /// Project root directory.
    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    /// Input directory, relative to the root.
    pub fn input_dir(&self) -> &str {
        &self.input_dir
    }

    /// Output directory, relative to the root.
    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    /// Go entry point file name.
    pub fn main_input_file(&self) -> &str {
        &self.main_input_file
    }

    /// Emitted Wasm binary file name.
    pub fn output_wasm_file(&self) -> &str {
        &self.output_wasm_file
    }

    /// Binary file name without its `.wasm` suffix.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Import specifier of the binary inside the generated loader.
    pub fn module_path(&self) -> String {
        format!("./{}", self.output_wasm_file)
    }

    /// API route prefix used by the Pages worker logic.
    pub fn api_route_prefix(&self) -> &str {
        &self.api_route_prefix
    }

    /// Configured compiler profile.
    pub fn compiler_mode(&self) -> CompilerMode {
        self.compiler_mode
    }

    /// Ceiling on a single compilation.
    pub fn compile_timeout(&self) -> Duration {
        self.compile_timeout
    }

    /// Pages build shortcut.
    pub fn pages_shortcut(&self) -> &str {
        &self.pages_shortcut
    }

    /// Workers build shortcut.
    pub fn workers_shortcut(&self) -> &str {
        &self.workers_shortcut
    }

    /// Full path of the Go entry point.
    pub fn input_path(&self) -> PathBuf {
        self.input_dir_path().join(&self.main_input_file)
    }

    /// Full path of the input directory.
    pub fn input_dir_path(&self) -> PathBuf {
        Path::new(&self.root_dir).join(&self.input_dir)
    }

    /// Full path of the output directory.
    pub fn output_dir_path(&self) -> PathBuf {
        Path::new(&self.root_dir).join(&self.output_dir)
    }

    /// Compiler arguments: fixed ones first, then the provider's.
    pub fn compiler_arguments(&self) -> Vec<String> {
        let mut args = self.compiler_args.clone();
        args.extend((self.compiling_arguments)());
        args
    }

    /// Send a message to the configured logger.
    pub fn log(&self, message: &str) {
        (self.logger)(message);
    }

    /// A view of this configuration writing into `output_dir` instead.
    ///
    /// An empty directory leaves the configured one in place.
    #[must_use]
    pub fn with_output_dir(&self, output_dir: impl AsRef<str>) -> Self {
        let mut scoped = self.clone();
        scoped.output_dir = normalize_dir(output_dir.as_ref(), || self.output_dir.clone());
        scoped
    }

    /// Check that the main input file still exists.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ConfigValidation`] naming the missing path.
    pub fn ensure_input_exists(&self) -> Result<(), DeployError> {
        let input = self.input_path();
        if input.is_file() {
            Ok(())
        } else {
            Err(DeployError::config_validation(format!(
                "input file not found: {}",
                input.display()
            )))
        }
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("root_dir", &self.root_dir)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("main_input_file", &self.main_input_file)
            .field("output_wasm_file", &self.output_wasm_file)
            .field("api_route_prefix", &self.api_route_prefix)
            .field("compiler_mode", &self.compiler_mode)
            .finish_non_exhaustive()
    }
}

fn or_default(value: &str, default: impl FnOnce() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default()
    } else {
        trimmed.to_string()
    }
}

fn normalize_dir(value: &str, default: impl FnOnce() -> String) -> String {
    let trimmed = value.trim();
    let stripped = trimmed.trim_end_matches(['/', '\\']);
    if stripped.is_empty() {
        if trimmed.is_empty() {
            default()
        } else {
            // a bare root separator
            trimmed[..1].to_string()
        }
    } else {
        stripped.to_string()
    }
}

fn module_name(output_wasm_file: &str) -> String {
    match output_wasm_file.strip_suffix(".wasm") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => output_wasm_file.to_string(),
    }
}

/// Default values for unresolved fields.
mod defaults {
    use std::sync::Arc;

    use super::{ArgumentProvider, Logger};

    pub fn root_dir() -> String {
        ".".to_string()
    }

    pub fn input_dir() -> String {
        "web".to_string()
    }

    pub fn output_dir() -> String {
        "deploy/cloudflare".to_string()
    }

    pub fn main_input_file() -> String {
        "main.go".to_string()
    }

    pub fn output_wasm_file() -> String {
        "worker.wasm".to_string()
    }

    pub fn api_route_prefix() -> String {
        "/api/".to_string()
    }

    pub fn compiler_mode() -> String {
        "M".to_string()
    }

    pub const fn compile_timeout_secs() -> u64 {
        40
    }

    pub fn pages_shortcut() -> String {
        "f".to_string()
    }

    pub fn workers_shortcut() -> String {
        "w".to_string()
    }

    pub fn logger() -> Logger {
        Arc::new(|message: &str| tracing::info!(target: "edge_deploy", "{message}"))
    }

    pub fn compiling_arguments() -> ArgumentProvider {
        Arc::new(Vec::<String>::new)
    }
}
