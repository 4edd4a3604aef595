//! CLI for wipetrace: find out how a disk was wiped.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wipetrace")]
#[command(about = "wipetrace — forensic wipe-pattern scanner for disks, images and slack space")]
#[command(version = wipetrace_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file, disk image, block device or directory for wipe patterns
    Scan {
        /// File, image, block device, or directory (with --slack / --all)
        target: String,

        /// Bytes per analysis chunk
        #[arg(long, default_value_t = wipetrace_core::DEFAULT_CHUNK_SIZE)]
        chunk: usize,

        /// Scan the slack space of every file under a directory
        #[arg(long, conflicts_with = "all")]
        slack: bool,

        /// Scan every .bin file in a directory, one verdict per file
        #[arg(long)]
        all: bool,

        /// Skip chunks that start with a known file signature
        #[arg(long)]
        skip_allocated: bool,

        /// Write a JSON report (default name: wipe_report_<timestamp>.json)
        #[arg(long, value_name = "FILE")]
        json: Option<Option<String>>,

        /// Write a CSV export (default name: wipe_report_<timestamp>.csv)
        #[arg(long, value_name = "FILE")]
        csv: Option<Option<String>>,

        /// Hide detections below this confidence (0-100)
        #[arg(long, default_value_t = wipetrace_core::DEFAULT_MIN_CONFIDENCE)]
        min_confidence: f64,

        /// Classify on N worker threads (1 = sequential)
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Threshold overrides as JSON (see `wipetrace thresholds`)
        #[arg(long, value_name = "FILE")]
        config: Option<String>,

        /// Print every detection as it is found
        #[arg(long, short)]
        verbose: bool,

        /// No progress bar or detection table; verdict only
        #[arg(long, short, conflicts_with = "verbose")]
        quiet: bool,
    },

    /// Write a set of synthetic wipe images for testing
    Generate {
        /// Output directory (created if missing)
        dir: String,

        /// Size of each image in bytes
        #[arg(long, default_value_t = wipetrace_core::samples::DEFAULT_SAMPLE_SIZE)]
        size: usize,

        /// Seed for the random sections
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Print the default detection thresholds as JSON
    Thresholds,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            target,
            chunk,
            slack,
            all,
            skip_allocated,
            json,
            csv,
            min_confidence,
            threads,
            config,
            verbose,
            quiet,
        } => commands::scan::run(commands::scan::ScanCommandConfig {
            target: &target,
            chunk_size: chunk,
            slack,
            all,
            skip_allocated,
            json_path: json.as_ref().map(|p| p.as_deref()),
            csv_path: csv.as_ref().map(|p| p.as_deref()),
            min_confidence,
            threads,
            config_path: config.as_deref(),
            verbose,
            quiet,
        }),
        Commands::Generate { dir, size, seed } => commands::generate::run(&dir, size, seed),
        Commands::Thresholds => commands::thresholds::run(),
    }
}
