//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use opws_builder_core::{BuildReporter, BuildSummary, LocalFs, is_version_mismatch, run_build};
use opws_builder_shared::{
    BuildError, BuilderConfig, EXPECTED_VERSION_ENV, init_config, load_config,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// opws-builder: publish an opws dataset as static JSON, JSONP and YAML.
#[derive(Parser)]
#[command(
    name = "opws-builder",
    version,
    about = "Build versioned JSON/JSONP artifacts and bundles from an opws YAML dataset.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./opws-builder.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build every artifact for the dataset.
    Build(BuildArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides applied on top of the loaded config.
#[derive(Args, Debug, Default)]
pub(crate) struct BuildArgs {
    /// Dataset root containing SCHEMA_VERSION.
    #[arg(long, env = "OPWS_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Output root.
    #[arg(long, env = "OPWS_OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Domain stamped into JSONP envelopes.
    #[arg(long)]
    pub domain: Option<String>,

    /// Dataset SCHEMA_VERSION this build accepts.
    #[arg(long, env = EXPECTED_VERSION_ENV)]
    pub expected_version: Option<String>,

    /// Collection to aggregate (repeatable; replaces the configured list).
    #[arg(long = "collection")]
    pub collections: Vec<String>,

    /// Directory for the BUILD_TIMESTAMP artifacts.
    #[arg(long)]
    pub timestamp_dir: Option<PathBuf>,

    /// Maximum simultaneous file reads.
    #[arg(long)]
    pub max_reads: Option<usize>,

    /// Maximum simultaneous file writes.
    #[arg(long)]
    pub max_writes: Option<usize>,

    #[arg(long)]
    pub no_json_slices: bool,

    #[arg(long)]
    pub no_jsonp_slices: bool,

    /// Skip the verbatim YAML copies.
    #[arg(long)]
    pub no_raw_slices: bool,

    #[arg(long)]
    pub no_json_bundles: bool,

    #[arg(long)]
    pub no_jsonp_bundles: bool,
}

impl BuildArgs {
    /// Merge flags over `config`. Unset flags keep the config's value.
    pub(crate) fn apply(self, mut config: BuilderConfig) -> BuilderConfig {
        if let Some(dir) = self.base_dir {
            config.base_dir = dir;
        }
        if let Some(dir) = self.out_dir {
            config.out_dir = dir;
        }
        if let Some(domain) = self.domain {
            config.build_domain = domain;
        }
        if let Some(version) = self.expected_version {
            config.expected_version = version;
        }
        if !self.collections.is_empty() {
            config.collections = self.collections;
        }
        if self.timestamp_dir.is_some() {
            config.timestamp_dir = self.timestamp_dir;
        }
        if let Some(n) = self.max_reads {
            config.max_concurrent_reads = n;
        }
        if let Some(n) = self.max_writes {
            config.max_concurrent_writes = n;
        }
        config.json_slices &= !self.no_json_slices;
        config.jsonp_slices &= !self.no_jsonp_slices;
        config.raw_slices &= !self.no_raw_slices;
        config.json_bundles &= !self.no_json_bundles;
        config.jsonp_bundles &= !self.no_jsonp_bundles;
        config
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration (config file plus flags and environment).
    Show(BuildArgs),
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "opws_builder=info",
        1 => "opws_builder=debug",
        _ => "opws_builder=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build(args) => cmd_build(config_path, args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show(args) => cmd_config_show(config_path, args),
        },
    }
}

async fn cmd_build(config_path: Option<&Path>, args: BuildArgs) -> Result<()> {
    let config = args.apply(load_config(config_path)?);

    info!(
        base_dir = %config.base_dir.display(),
        out_dir = %config.out_dir.display(),
        expected_version = %config.expected_version,
        "building dataset"
    );

    let reporter = CliProgress::new();
    let summary = match run_build(&config, Arc::new(LocalFs), &reporter).await {
        Ok(summary) => summary,
        Err(e) if is_version_mismatch(&e) => {
            reporter.abandon();
            report_version_mismatch(&e);
            std::process::exit(1);
        }
        Err(e) => {
            reporter.abandon();
            return Err(eyre!(e));
        }
    };

    println!();
    println!("  Build complete!");
    println!("  Version:   {}", summary.version);
    println!("  Timestamp: {}", summary.timestamp);
    for (name, items) in &summary.collections {
        println!("  {name:<10} {items} items");
    }
    println!("  Artifacts: {}", summary.artifacts_written);
    println!("  Path:      {}", summary.build_dir.display());
    println!(
        "  Time:      {:.1}s",
        summary.elapsed.as_secs_f64()
    );
    println!();

    Ok(())
}

fn report_version_mismatch(err: &BuildError) {
    if let BuildError::VersionMismatch { actual, expected } = err {
        eprintln!("Error: unexpected SCHEMA_VERSION in dataset");
        eprintln!("  dataset:  {actual}");
        eprintln!("  expected: {expected}");
        eprintln!(
            "Update opws-builder or set {EXPECTED_VERSION_ENV}={actual} to build this dataset."
        );
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn abandon(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BuildReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn collection_done(&self, name: &str, items: usize) {
        self.spinner
            .println(format!("  ✓ {name} ({items} items)"));
    }

    fn done(&self, _summary: &BuildSummary) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
    let path = init_config(&cwd)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>, args: BuildArgs) -> Result<()> {
    let config = args.apply(load_config(config_path)?);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
