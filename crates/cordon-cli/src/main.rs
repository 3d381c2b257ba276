//! cordon - run Lua modules under the securable module loader
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CORDON_*`)
//! 3. Explicit config file (`--config`)
//! 4. Project config (`cordon.toml` in the project root)
//! 5. Global config (`~/.cordon/config.toml`)
//! 6. Default values (lowest priority)
//!
//! # Output
//!
//! Results are printed to stdout as JSON. Logs, module `print` output and
//! `console` calls go to stderr through `tracing`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cordon_lua::{HostCapabilities, Loader, LoaderOptions, ScriptOptions};
use cordon_runtime::{ConfigLoader, Enforcement, LoaderConfig};
use cordon_types::{ErrorCode, Principal};
use mlua::{DeserializeOptions, LuaSerdeExt, Value};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// cordon - securable CommonJS/AMD modules for Lua
#[derive(Parser, Debug)]
#[command(name = "cordon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Explicit config file, layered over the project config
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Module root directory, repeatable (replaces configured roots)
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// Dependency manifest (JSON or TOML)
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Refuse manifest findings instead of warning
    #[arg(long)]
    deny: bool,

    /// Run modules without an explicit principal elevated
    #[arg(long)]
    elevated: bool,

    /// Answer require("host") with the host capability bundle
    #[arg(long)]
    host: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Require a module and print its exports
    Run {
        /// Module id, resolved against the roots
        module: String,
    },
    /// Evaluate a Lua snippet and print its value
    Eval {
        /// Lua source
        code: String,
    },
    /// Run a script file and print its return value
    Script {
        /// Path to the script
        file: PathBuf,
    },
}

impl Args {
    /// Resolves layered configuration with CLI overrides on top.
    fn resolve_config(&self) -> Result<LoaderConfig> {
        let project_root = match &self.project {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };

        let mut loader = ConfigLoader::new().with_project_root(project_root);
        if let Some(path) = &self.config {
            loader = loader.with_config_file(path);
        }
        let mut config = loader
            .load()
            .map_err(|e| anyhow::anyhow!("Config error [{}]: {e}", e.code()))?;

        if !self.roots.is_empty() {
            config.root_paths.clone_from(&self.roots);
        }
        if let Some(path) = &self.manifest {
            config.manifest = Some(path.clone());
        }
        if self.deny {
            config.enforcement = Enforcement::Deny;
        }
        if self.elevated {
            config.default_principal = Principal::Elevated;
        }
        Ok(config)
    }
}

fn init_tracing(debug: bool, config: &LoaderConfig) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

/// Converts a Lua value to JSON, rendering functions and userdata as `null`.
fn to_json(loader: &Loader, value: Value) -> Result<serde_json::Value> {
    let options = DeserializeOptions::new().deny_unsupported_types(false);
    loader
        .lua()
        .from_value_with(value, options)
        .context("result cannot be represented as JSON")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;
    init_tracing(args.debug, &config);

    info!(
        roots = config.root_paths.len(),
        principal = %config.default_principal,
        enforcement = %config.enforcement,
        "Starting loader"
    );

    let mut options = LoaderOptions::from_config(&config)
        .map_err(|e| anyhow::anyhow!("[{}] {e}", e.code()))?;
    if args.host {
        options = options.with_exports_override(HostCapabilities::new());
    }
    let loader = Loader::new(options).map_err(|e| anyhow::anyhow!("[{}] {e}", e.code()))?;

    let result = match &args.command {
        Command::Run { module } => loader.require(module),
        Command::Eval { code } => loader.run_script(ScriptOptions::new(code.as_str()).with_filename("<eval>")),
        Command::Script { file } => {
            let contents = std::fs::read_to_string(file)
                .with_context(|| format!("cannot read script {}", file.display()))?;
            loader.run_script(ScriptOptions::new(contents).with_filename(file.display().to_string()))
        }
    };
    let value = result.map_err(|e| anyhow::anyhow!("[{}] {e}", e.code()))?;

    debug!(modules = loader.cached_paths().len(), "Finished");
    let json = to_json(&loader, value)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
