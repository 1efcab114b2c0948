use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use txn_etl::config::EtlConfig;
use txn_etl::constants::{EXIT_FATAL, EXIT_NO_ACCEPTED_RECORDS};
use txn_etl::error::EtlError;
use txn_etl::log_reader::TransactionLogReader;
use txn_etl::pipeline::{self, ArchiveStatus, RunReport, StructuredStatus};
use txn_etl::{logging, metrics, metrics_push};

#[derive(Parser)]
#[command(name = "txn_etl")]
#[command(about = "Normalize QuickCart transaction logs and load them into the archive and relational stores")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./txn_etl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read, archive and load a transaction log
    Run {
        /// Newline-delimited JSON input file
        #[arg(long)]
        input: Option<PathBuf>,
        /// Archive database file
        #[arg(long)]
        archive: Option<PathBuf>,
        /// Relational database file
        #[arg(long)]
        database: Option<PathBuf>,
        /// Skip archival for this run
        #[arg(long)]
        no_archive: bool,
        /// Create raw_transaction_logs if it does not exist
        #[arg(long)]
        create_table: bool,
    },
    /// Read and normalize the input only; nothing is written
    Check {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match EtlConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match &cli.command {
        Commands::Run {
            input,
            archive,
            database,
            no_archive,
            create_table,
        } => {
            if let Some(input) = input {
                config.input_path = input.clone();
            }
            if let Some(archive) = archive {
                config.archive.path = archive.clone();
            }
            if let Some(database) = database {
                config.structured.path = database.clone();
            }
            if *no_archive {
                config.archive.enabled = false;
            }
            if *create_table {
                config.structured.create_table_if_missing = true;
            }
        }
        Commands::Check { input } => {
            if let Some(input) = input {
                config.input_path = input.clone();
            }
        }
    }

    let _log_guard = logging::init_logging(&config.logging.dir);
    metrics::init_metrics();

    let code = match cli.command {
        Commands::Run { .. } => run(&config),
        Commands::Check { .. } => check(&config),
    };

    if let Some(url) = config.metrics.pushgateway_url.as_deref() {
        let instance = config
            .input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string());
        metrics_push::push_to_pushgateway(url, config.metrics.job_name(), &instance);
    }

    code
}

fn run(config: &EtlConfig) -> ExitCode {
    println!("🚀 Running transaction log ETL for {}", config.input_path.display());
    match pipeline::run(config) {
        Ok(report) => {
            print_report(&report);
            match serde_json::to_string(&report) {
                Ok(json) => info!(report = %json, "Run finished"),
                Err(e) => error!("Failed to serialize run report: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(EtlError::NoAcceptedRecords { skipped }) => {
            println!("❌ No valid records to process ({} skipped)", skipped);
            ExitCode::from(EXIT_NO_ACCEPTED_RECORDS)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            println!("❌ Run failed: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn check(config: &EtlConfig) -> ExitCode {
    let reader = TransactionLogReader::new(&config.input_path);
    match reader.read() {
        Ok(outcome) => {
            println!("\n🔎 Check results for {}:", reader.path().display());
            println!("   Lines: {}", outcome.lines);
            println!("   Accepted: {}", outcome.accepted_count());
            println!("   Skipped: {}", outcome.skipped);
            println!("   Amounts coerced to 0.0: {}", outcome.coerced);
            if outcome.accepted.is_empty() {
                ExitCode::from(EXIT_NO_ACCEPTED_RECORDS)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("Check failed: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn print_report(report: &RunReport) {
    println!("\n📊 Run results for {}:", report.input);
    println!("   Lines read: {}", report.lines);
    println!("   Accepted: {}", report.accepted);
    println!("   Skipped: {}", report.skipped);
    println!("   Amounts coerced: {}", report.coerced);

    match &report.archive {
        ArchiveStatus::Completed(summary) => println!(
            "   Archive: {} inserted, {} duplicates, {} failed{}",
            summary.inserted,
            summary.duplicates,
            summary.failed,
            if summary.used_fallback { " (individual fallback)" } else { "" }
        ),
        ArchiveStatus::Skipped { reason } => println!("   Archive: skipped ({})", reason),
    }

    match &report.structured {
        StructuredStatus::Committed(summary) => println!(
            "   Structured: {} inserted, {} failed",
            summary.inserted, summary.failed
        ),
        StructuredStatus::NothingCommitted(summary) => println!(
            "   ⚠️  Structured: nothing committed, all {} rows failed",
            summary.failed
        ),
        StructuredStatus::RolledBack { reason } => {
            println!("   ⚠️  Structured: rolled back ({})", reason)
        }
    }
    println!("   Duration: {:.2}s", report.duration_secs);
}
