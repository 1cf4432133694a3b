//! Gas Station Service - Main Daemon
//!
//! A server-side daemon that:
//! 1. Verifies the PostGIS station store on startup
//! 2. Imports the Cologne gas station feed immediately and then on an interval
//! 3. Serves proximity queries and a manual import trigger over HTTP
//!
//! Usage:
//!   cargo run --release                          # Daemon with HTTP endpoint on the configured port
//!   cargo run --release -- --port 8080           # Override the port
//!   cargo run --release -- --no-endpoint         # Scheduled imports only
//!   cargo run --release -- --config prod.toml    # Alternative configuration file
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (from .env)
//!   RUST_LOG     - tracing filter, overrides --verbose

use clap::Parser;
use gas_station_service::config::ServiceConfig;
use gas_station_service::endpoint::{self, EndpointState};
use gas_station_service::importer::Importer;
use gas_station_service::ingest::feed::HttpFeatureSource;
use gas_station_service::logging;
use gas_station_service::model::SearchRadius;
use gas_station_service::query::ProximityQueryService;
use gas_station_service::repository::{PostgisStationRepository, StationRepository};
use gas_station_service::scheduler::ImportScheduler;
use gas_station_service::db;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "gas_station_service", version, about = "Gas station import and proximity search service")]
struct Cli {
    /// Configuration file (default: service.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port, overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,

    /// Run scheduled imports without the HTTP endpoint
    #[arg(long)]
    no_endpoint: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Configuration error: {}\n", e);
            std::process::exit(1);
        }
    };

    logging::init(cli.verbose, config.log_json);

    println!("⛽ Gas Station Service");
    println!("======================\n");

    if let Err(e) = run(&cli, config) {
        tracing::error!("Service failed: {}", e);
        eprintln!("\n❌ {}\n", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: ServiceConfig) -> Result<(), Box<dyn Error>> {
    // Store must be reachable and migrated before anything else starts
    tracing::info!("Connecting to database...");
    let pool = db::connect_pool(config.pool_size)?;
    let repository = Arc::new(PostgisStationRepository::new(pool));
    repository.check_ready()?;
    tracing::info!("Database ready");

    let source = HttpFeatureSource::new(
        config.feed_url.clone(),
        config.fetch_timeout(),
        config.accept_invalid_certs,
    )?;
    tracing::info!("Feed: {}", source.url());

    let importer = Arc::new(Importer::new(Box::new(source), repository.clone()));
    let scheduler = ImportScheduler::start(importer.clone(), config.import_interval())?;

    if cli.no_endpoint {
        tracing::info!("HTTP endpoint disabled, running scheduled imports only");
        scheduler.join();
        return Ok(());
    }

    let mut queries = ProximityQueryService::new(
        repository.clone(),
        SearchRadius::from_meters(config.default_radius_meters)?,
    );
    if let Some(max) = config.max_radius_meters {
        queries = queries.with_max_radius(SearchRadius::from_meters(max)?);
    }
    let state = Arc::new(EndpointState {
        importer,
        queries,
        repository,
    });

    let port = cli.port.unwrap_or(config.http_port);
    endpoint::start_endpoint_server(port, state, config.pool_size as usize)?;

    scheduler.stop();
    Ok(())
}
