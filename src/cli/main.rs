//! CLI binary entry point for dataset-loader

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use dataset_loader::cli::commands::load::{LoadArgs, handle_load};
#[cfg(feature = "cli")]
use dataset_loader::cli::logging;
#[cfg(feature = "cli")]
use dataset_loader::ingest::{DEFAULT_CHUNK_SIZE, DEFAULT_TABLE_SUFFIX};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "dataset-loader")]
#[command(about = "Load headerless CSV exports into database tables using a JSON schema catalog")]
#[command(version)]
struct Cli {
    /// Datasets to load (default: every dataset in schemas.json)
    #[arg(short = 'd', long = "ds-name", alias = "ds_name", num_args = 1..)]
    ds_name: Vec<String>,

    /// Number of rows per chunk
    #[arg(short = 'c', long = "chunk-size", alias = "cs", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Suffix appended to the dataset name to form the destination table
    #[arg(long, default_value = DEFAULT_TABLE_SUFFIX)]
    table_suffix: String,

    /// Give up on a chunk write after this many seconds
    #[arg(long)]
    write_timeout_secs: Option<u64>,

    /// Stop at the first failed chunk, file or dataset
    #[arg(long)]
    fail_fast: bool,

    /// Directory for application.log
    #[arg(long, default_value = logging::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report_json: Option<PathBuf>,
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_dir, "info") {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let args = LoadArgs {
        datasets: cli.ds_name,
        chunk_size: cli.chunk_size,
        table_suffix: cli.table_suffix,
        write_timeout_secs: cli.write_timeout_secs,
        fail_fast: cli.fail_fast,
        report_json: cli.report_json,
    };

    if let Err(e) = handle_load(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
