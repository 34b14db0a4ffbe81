#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use spotcheck_core::output::OutputWriter;
use spotcheck_core::{Mode, RunReport, SpotConfig, DEFAULT_CONFIG_FILE};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "spotcheck",
    version,
    about = "Idempotence-checked formatting with git ratchet"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Report files that are not in canonical form
    Check(RunArgs),
    /// Rewrite files into canonical form
    Apply(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Configuration file (default: <root>/spotcheck.yml)
    #[arg(long, env = "SPOTCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Project root (default: current directory)
    #[arg(long, env = "SPOTCHECK_ROOT")]
    root: Option<PathBuf>,

    /// Baseline reference for every format, overriding the configuration
    #[arg(long, env = "SPOTCHECK_RATCHET_FROM")]
    ratchet_from: Option<String>,

    /// Output format: text or json
    #[arg(long, env = "SPOTCHECK_OUTPUT_FORMAT", default_value = "text")]
    output_format: String,

    /// Size of each worker pool
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the intermediate outputs of misbehaving step chains here
    #[arg(long, env = "SPOTCHECK_DIAGNOSE_DIR")]
    diagnose_dir: Option<PathBuf>,
}

/// Output format for the CLI
enum OutputFormat {
    /// Pretty JSON report to stdout
    Json,
    /// Human-readable summary to stdout
    Text,
}

impl OutputFormat {
    fn parse(explicit: &str) -> Option<Self> {
        match explicit {
            "json" => Some(OutputFormat::Json),
            "text" | "" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let code = match cli.command {
        Commands::Check(args) => run_command(args, Mode::Check),
        Commands::Apply(args) => run_command(args, Mode::Apply),
    };
    std::process::exit(code);
}

fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Logs go to stderr so stdout stays parseable
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env("SPOTCHECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Filter empty string from Option (env vars may produce "" for empty values)
fn clean_opt(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

fn config_path(args: &RunArgs, root: &Path) -> PathBuf {
    args.config
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE))
}

fn run_command(args: RunArgs, mode: Mode) -> i32 {
    let Some(output_format) = OutputFormat::parse(&args.output_format) else {
        eprintln!(
            "Error: unknown output format '{}' (expected text or json)",
            args.output_format
        );
        return 1;
    };

    let root = args
        .root
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config_file = config_path(&args, &root);
    debug!(config = %config_file.display(), root = %root.display(), "loading configuration");
    let mut config = match SpotConfig::load(&config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            return 1;
        }
    };
    if let Some(reference) = clean_opt(&args.ratchet_from) {
        config.override_ratchet_from(reference);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = Some(concurrency.max(1));
    }
    if let Some(dir) = args.diagnose_dir.clone().filter(|p| !p.as_os_str().is_empty()) {
        config.diagnose_dir = Some(dir);
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build();
    let rt = match rt {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            return 1;
        }
    };

    let report = match rt.block_on(spotcheck_core::run(&config, &root, mode)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    if let Err(e) = write_report(&report, &output_format) {
        eprintln!("Error: failed to write report: {e}");
        return 1;
    }

    if report.is_success() {
        0
    } else {
        1
    }
}

fn write_report(report: &RunReport, format: &OutputFormat) -> spotcheck_core::Result<()> {
    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    match format {
        OutputFormat::Json => OutputWriter::write_json(&mut w, report)?,
        OutputFormat::Text => OutputWriter::write_text_summary(&mut w, report)?,
    }
    w.flush()?;
    Ok(())
}
