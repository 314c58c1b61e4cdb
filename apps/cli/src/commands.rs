//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use kustbench_core::{BenchSummary, BuildEngine, BuildHarness, ResourceRenderer};
use kustbench_shared::{AppConfig, TreeFootprint, init_config, load_config, load_config_from};
use kustbench_storage::{DiskFs, FileSystem, InMemoryFs};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// kustbench: generate synthetic overlay trees and benchmark builds over them.
#[derive(Parser)]
#[command(
    name = "kustbench",
    version,
    about = "Generate synthetic configuration-overlay trees and benchmark builds over them.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.kustbench/kustbench.toml).
    #[arg(long, global = true, env = "KUSTBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Write the scenario tree to a directory on disk.
    Generate {
        /// Directory the tree root is created under.
        #[arg(short, long)]
        out: PathBuf,

        /// Root synthetic id (overrides config).
        #[arg(long)]
        root_id: Option<String>,

        /// Root path inside the output directory (overrides config).
        #[arg(long)]
        root_path: Option<String>,
    },

    /// Generate in memory and time the build engine over the tree.
    Bench {
        /// Number of runs, each against a fresh in-memory sink.
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the generation table, its footprint, and the tree fingerprint.
    Inspect,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));

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

/// Filter directive used when `RUST_LOG` is unset.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "kustbench=info",
        1 => "kustbench=debug",
        _ => "kustbench=trace",
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Generate {
            out,
            root_id,
            root_path,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(id) = root_id {
                config.defaults.root_id = id;
            }
            if let Some(path) = root_path {
                config.defaults.root_path = path;
            }
            cmd_generate(&config, &out)
        }
        Command::Bench { iterations, json } => {
            let config = resolve_config(config_path.as_deref())?;
            let iterations = iterations.unwrap_or(config.defaults.iterations);
            cmd_bench(&config, iterations, json)
        }
        Command::Inspect => cmd_inspect(&resolve_config(config_path.as_deref())?),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(config_path.as_deref())?),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_generate(config: &AppConfig, out: &Path) -> Result<()> {
    let harness = BuildHarness::from_config(config)?;
    let fs = DiskFs::new(out);

    // Nothing is deleted before writing: a smaller run over a larger one
    // leaves unreferenced files behind.
    if fs.is_dir(harness.root_path()) && !fs.list_dir(harness.root_path())?.is_empty() {
        warn!(
            path = %fs.root().join(harness.root_path()).display(),
            "target is not empty; stale files from earlier runs will not be removed"
        );
    }

    info!(
        out = %out.display(),
        root = harness.root_path(),
        id = %harness.root_id(),
        "generating tree"
    );

    let spinner = spinner("Generating tree")?;
    harness.generate(&fs)?;
    spinner.finish_and_clear();

    let footprint = harness.table().footprint();
    println!();
    println!("  Tree generated!");
    println!("  Path:      {}", fs.root().join(harness.root_path()).display());
    print_footprint(&footprint);
    println!();

    Ok(())
}

fn cmd_bench(config: &AppConfig, iterations: u32, json: bool) -> Result<()> {
    if iterations == 0 {
        return Err(eyre!("--iterations must be at least 1"));
    }

    let harness = BuildHarness::from_config(config)?;
    let engine = ResourceRenderer::new();
    let started_at = chrono::Utc::now();

    info!(iterations, engine = engine.name(), "starting benchmark");

    let bar = ProgressBar::new(u64::from(iterations));
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} runs {msg}",
    )?);

    let mut reports = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let report = harness.run_fresh(&engine)?;
        bar.set_message(format!("last build {:.1}ms", report.build.as_secs_f64() * 1000.0));
        bar.inc(1);
        reports.push(report);
    }
    bar.finish_and_clear();

    let summary = BenchSummary::from_reports(&reports)?;
    let footprint = harness.table().footprint();

    if json {
        let out = serde_json::json!({
            "started_at": started_at.to_rfc3339(),
            "engine": engine.name(),
            "root": harness.root_path(),
            "footprint": footprint,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  Benchmark complete");
    println!("  Engine:    {}", engine.name());
    println!("  Runs:      {}", summary.iterations);
    print_footprint(&footprint);
    println!("  Output:    {} bytes (discarded)", summary.rendered_bytes);
    println!("  Generate:  {:.1}ms mean (untimed setup)", summary.generation_mean_ms);
    println!(
        "  Build:     {:.1}ms min / {:.1}ms mean / {:.1}ms max",
        summary.build_min_ms, summary.build_mean_ms, summary.build_max_ms
    );
    println!();

    Ok(())
}

fn cmd_inspect(config: &AppConfig) -> Result<()> {
    let harness = BuildHarness::from_config(config)?;
    let table = harness.table();

    println!();
    println!("  Depth  Files  Subtrees  Patches  Namespaced  Prefix  Suffix  Labels  Annotations");
    for (depth, profile) in table.iter().enumerate() {
        println!(
            "  {:<5}  {:<5}  {:<8}  {:<7}  {:<10}  {:<6}  {:<6}  {:<6}  {}",
            depth,
            profile.file_resource_count,
            profile.inline_resource_count,
            profile.patch_count,
            profile.namespaced,
            profile.prefix().unwrap_or("-"),
            profile.suffix().unwrap_or("-"),
            profile.common_labels.len(),
            profile.common_annotations.len(),
        );
    }
    println!();
    println!("  Max depth: {}", table.max_depth());
    print_footprint(&table.footprint());

    let fs = InMemoryFs::new();
    harness.generate(&fs)?;
    println!("  Bytes:     {}", fs.total_bytes());
    println!("  SHA-256:   {}", fs.fingerprint());
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let mut resolved = config.clone();
    if resolved.profiles.is_empty() {
        resolved.profiles = config.table()?.iter().cloned().collect();
    }
    resolved.validate()?;

    let toml_str = toml::to_string_pretty(&resolved)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_footprint(footprint: &TreeFootprint) {
    println!("  Nodes:     {}", footprint.nodes);
    println!("  Resources: {}", footprint.file_resources);
    println!("  Patches:   {}", footprint.patch_files);
    println!("  Files:     {}", footprint.total_files());
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}
