//! certdup CLI - group certificate-transparency records by fingerprint.

use certdup::{
    DedupConfig, DedupStats, Deduplicator, MalformedPolicy, Phase, ProgressReporter, Strategy,
    TracingReporter,
};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// JSON output for a run.
#[derive(Serialize)]
struct JsonOutput {
    input: String,
    output: String,
    #[serde(flatten)]
    stats: DedupStats,
    throughput_records_s: f64,
}

/// Group construction strategy.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum StrategyArg {
    /// One file per duplicated fingerprint, merged at the end
    Disk,
    /// All locations in memory, written after the scan
    Memory,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Disk => Strategy::Disk,
            StrategyArg::Memory => Strategy::Memory,
        }
    }
}

/// Find certificate-transparency records that share a certificate fingerprint.
///
/// Every fingerprint seen more than once becomes one output line holding all
/// of its records, copied verbatim from the input.
#[derive(Parser, Debug)]
#[command(name = "certdup")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input file, one JSON log entry per line.
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Directory for the output file and temporary group files.
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Name of the output file inside the output directory.
    #[arg(long, value_name = "NAME")]
    output_name: Option<String>,

    /// How duplicate groups are built.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Keep temporary group files after the merge.
    #[arg(long)]
    keep_temp: bool,

    /// Skip lines without a readable fingerprint instead of aborting.
    #[arg(long)]
    skip_malformed: bool,

    /// Output results as JSON.
    #[arg(long)]
    json: bool,

    /// Show a progress spinner.
    #[arg(long)]
    progress: bool,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Create a spinner for indeterminate progress.
fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Drives a spinner from phase and scan progress callbacks.
struct SpinnerReporter {
    pb: ProgressBar,
}

impl ProgressReporter for SpinnerReporter {
    fn phase_started(&mut self, phase: Phase) {
        let msg = match phase {
            Phase::Scan => "Scanning input...",
            Phase::Write => "Writing duplicate groups...",
            Phase::Merge => "Merging group files...",
        };
        self.pb.set_message(msg);
    }

    fn records_scanned(&mut self, records: u64) {
        self.pb.set_message(format!("Scanned {records} records"));
    }

    fn phase_finished(&mut self, phase: Phase, elapsed: Duration) {
        tracing::debug!(%phase, elapsed_secs = elapsed.as_secs_f64(), "Phase finished");
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "certdup=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_config(args: &Cli, input: PathBuf) -> DedupConfig {
    let mut config = DedupConfig::from_env(input);
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(name) = &args.output_name {
        config = config.with_output_name(name.clone());
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy.into());
    }
    if args.keep_temp {
        config = config.with_keep_temp(true);
    }
    if args.skip_malformed {
        config = config.with_malformed_policy(MalformedPolicy::Skip);
    }
    config
}

fn print_summary(config: &DedupConfig, stats: &DedupStats) {
    eprintln!();
    eprintln!("Deduplication Results:");
    eprintln!("  Records:                 {}", stats.records);
    eprintln!("  Unique fingerprints:     {}", stats.unique_fingerprints);
    eprintln!("  Duplicated fingerprints: {}", stats.duplicated_fingerprints);
    eprintln!("  Duplicate records:       {}", stats.duplicate_records);
    if stats.malformed_skipped > 0 {
        eprintln!("  Malformed (skipped):     {}", stats.malformed_skipped);
    }
    eprintln!();
    eprintln!("Output:");
    eprintln!("  File:              {}", config.output_path().display());
    eprintln!("  Groups written:    {}", stats.groups_written);
    eprintln!("  Bytes written:     {}", stats.bytes_written);
    eprintln!();
    eprintln!("Performance:");
    eprintln!("  Strategy:          {}", stats.strategy);
    eprintln!("  Processing time:   {:.3}s", stats.elapsed_secs);
    eprintln!("  Throughput:        {:.0} records/sec", stats.throughput());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    // Handle completions subcommand
    if let Some(Commands::Completions { shell }) = args.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "certdup", &mut io::stdout());
        return Ok(());
    }

    let input = args.input.clone().ok_or("Input file is required")?;
    init_tracing(args.verbose);

    let config = build_config(&args, input);

    if args.verbose && !args.json {
        eprintln!("Configuration:");
        eprintln!("  Input: {}", config.input.display());
        eprintln!("  Output: {}", config.output_path().display());
        eprintln!("  Strategy: {}", config.strategy);
        eprintln!("  Keep temp files: {}", config.keep_temp);
        eprintln!("  Malformed lines: {:?}", config.on_malformed);
        eprintln!();
    }

    let dedup = Deduplicator::new(config.clone());
    let result = if args.progress && !args.json {
        let mut reporter = SpinnerReporter {
            pb: create_spinner("Starting..."),
        };
        let result = dedup.run_with_reporter(&mut reporter);
        reporter.pb.finish_and_clear();
        result
    } else {
        dedup.run_with_reporter(&mut TracingReporter)
    };

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if args.json {
        let output = JsonOutput {
            input: config.input.display().to_string(),
            output: config.output_path().display().to_string(),
            throughput_records_s: stats.throughput(),
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&config, &stats);
    }

    Ok(())
}
