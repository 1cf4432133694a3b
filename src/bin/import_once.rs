//! One-shot Gas Station Import
//!
//! Runs a single import cycle against the configured feed and store, prints
//! the summary, and exits. Exit status is non-zero when the cycle fails.
//!
//! Usage:
//!   cargo run --bin import_once
//!   cargo run --bin import_once -- --json          # Summary as JSON
//!   cargo run --bin import_once -- --dry-run       # In-memory store, no database
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (from .env)

use clap::Parser;
use gas_station_service::config::ServiceConfig;
use gas_station_service::db;
use gas_station_service::importer::{ImportSummary, Importer};
use gas_station_service::ingest::feed::HttpFeatureSource;
use gas_station_service::logging;
use gas_station_service::repository::{
    MemoryStationRepository, PostgisStationRepository, StationRepository,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "import_once", version, about = "Run one gas station import cycle")]
struct Cli {
    /// Configuration file (default: service.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Import into an in-memory store instead of the database
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("\n❌ {}\n", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::load(cli.config.as_deref())?;
    logging::init(cli.verbose, config.log_json);

    let repository: Arc<dyn StationRepository> = if cli.dry_run {
        Arc::new(MemoryStationRepository::new())
    } else {
        Arc::new(PostgisStationRepository::new(db::connect_pool(1)?))
    };

    let source = HttpFeatureSource::new(
        config.feed_url.clone(),
        config.fetch_timeout(),
        config.accept_invalid_certs,
    )?;

    let summary = Importer::new(Box::new(source), repository).run_cycle()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("\n⛽ Import Summary");
    println!("=================");
    println!("   Fetched:  {}", summary.fetched);
    println!("   Valid:    {}", summary.valid);
    println!("   Rejected: {}", summary.rejected.len());
    println!("   Imported: {}", summary.report.imported);
    println!("   Skipped:  {}", summary.report.skipped);
    println!(
        "   Duration: {} ms",
        (summary.finished_at - summary.started_at).num_milliseconds()
    );

    for rejection in &summary.rejected {
        match rejection.object_id {
            Some(id) => println!("   ✗ feature #{} (objectid {}): {}", rejection.index, id, rejection.reason),
            None => println!("   ✗ feature #{}: {}", rejection.index, rejection.reason),
        }
    }
    for skipped in &summary.report.skipped_stations {
        println!("   ⚠ objectid {} skipped by store: {}", skipped.object_id, skipped.reason);
    }
}
