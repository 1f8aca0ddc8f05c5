//! edge-deploy CLI entry point.
//!
//! Builds Cloudflare Pages or Workers artifacts from the Go entry point of
//! the current project.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_deploy_common::{BuildConfig, BuildTarget, CONFIG_FILE_NAME, ConfigFile};
use edge_deploy_core::{DeployPipeline, ProgressEvent};

/// Assemble Cloudflare deployment artifacts from a Go WebAssembly build.
#[derive(Parser)]
#[command(name = "edge-deploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Build `_worker.js` and the binary for Pages Advanced Mode (default)
    Pages,
    /// Build `_worker.js` and the binary for Workers
    Workers,
}

impl From<Commands> for BuildTarget {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Pages => BuildTarget::PagesAdvancedMode,
            Commands::Workers => BuildTarget::Workers,
        }
    }
}

/// Settings that take precedence over the configuration file.
#[derive(Args)]
struct Overrides {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "EDGE_DEPLOY_CONFIG")]
    config: Option<PathBuf>,

    /// Project root directory
    #[arg(long, global = true, env = "EDGE_DEPLOY_ROOT")]
    root: Option<String>,

    /// Directory holding the Go sources, relative to the root
    #[arg(long, global = true)]
    input_dir: Option<String>,

    /// Directory receiving the artifacts, relative to the root
    #[arg(long, global = true)]
    output_dir: Option<String>,

    /// Go entry point inside the input directory
    #[arg(long = "main", global = true)]
    main_input_file: Option<String>,

    /// File name of the generated WebAssembly binary
    #[arg(long = "wasm", global = true)]
    output_wasm_file: Option<String>,

    /// Request paths routed to the module in Pages Advanced Mode
    #[arg(long, global = true)]
    api_prefix: Option<String>,

    /// Compiler profile: L (fast), M (minimal) or S (production)
    #[arg(short, long, global = true, env = "EDGE_DEPLOY_MODE")]
    mode: Option<String>,

    /// Extra argument passed to the compiler (repeatable)
    #[arg(long = "compiler-arg", global = true)]
    compiler_args: Vec<String>,
}

impl Overrides {
    fn apply(self, build: &mut BuildConfig) {
        let fields = [
            (self.root, &mut build.root_dir),
            (self.input_dir, &mut build.input_dir),
            (self.output_dir, &mut build.output_dir),
            (self.main_input_file, &mut build.main_input_file),
            (self.output_wasm_file, &mut build.output_wasm_file),
            (self.api_prefix, &mut build.api_route_prefix),
            (self.mode, &mut build.compiler_mode),
        ];
        for (value, field) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        build.compiler_args.extend(self.compiler_args);
    }
}

/// Locate and read the configuration file, if there is one.
fn load_config_file(explicit: Option<&Path>, root: &str) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    let conventional = Path::new(root).join(CONFIG_FILE_NAME);
    if conventional.is_file() {
        debug!(path = %conventional.display(), "Using configuration file");
        return ConfigFile::from_file(&conventional)
            .with_context(|| format!("Failed to load {}", conventional.display()));
    }

    Ok(ConfigFile::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edge_deploy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let target: BuildTarget = cli.command.unwrap_or(Commands::Pages).into();

    let root = cli.overrides.root.clone().unwrap_or_else(|| ".".into());
    let mut build = load_config_file(cli.overrides.config.as_deref(), &root)?.build;
    cli.overrides.apply(&mut build);

    let config = build.resolve().context("Invalid build configuration")?;

    info!(
        build_target = %target,
        mode = %config.compiler_mode(),
        input = %config.input_path().display(),
        output = %config.output_dir_path().display(),
        "Configuration loaded"
    );

    let pipeline = DeployPipeline::with_tinygo(config);
    let print_progress = |event: &ProgressEvent| println!("  {}", event.message);

    let artifact = pipeline
        .build(target, &print_progress)
        .await
        .with_context(|| format!("{} build failed", target.label()))?;

    println!("{} build completed:", target.label());
    println!(
        "  {} ({} bytes)",
        artifact.script_path.display(),
        artifact.script_bytes
    );
    println!(
        "  {} ({} bytes)",
        artifact.wasm_path.display(),
        artifact.wasm_bytes
    );

    Ok(())
}
