use clap::Parser;
use std::path::PathBuf;
use txn_etl::archive::SqliteArchive;
use txn_etl::config::EtlConfig;

/// Print every archived document for an event id.
#[derive(Parser)]
#[command(name = "archive-lookup")]
struct Args {
    /// Event identifier (`event.id`) to look up
    #[arg(long)]
    event_id: String,

    /// Archive database file (defaults to the configured archive path)
    #[arg(long)]
    archive: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = EtlConfig::load(args.config.as_deref())?;
    let path = args.archive.unwrap_or(config.archive.path);

    let archive = SqliteArchive::connect(&path)?;
    let docs = archive.find_by_event_id(&args.event_id)?;

    if docs.is_empty() {
        println!("No archived documents for event {}", args.event_id);
    } else {
        println!("{} document(s) for event {}:", docs.len(), args.event_id);
        for doc in &docs {
            println!("{}", serde_json::to_string_pretty(doc)?);
        }
    }

    archive.close()?;
    Ok(())
}
