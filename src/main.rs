//! CLI entry point for the COVID route-dataset tool.
//!
//! Provides subcommands for downloading the case datasets, resolving
//! airports to regions, collecting the airline-route graph, aggregating
//! it into weighted edges, and building the border-closure dataset.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use covid_routes::datasets::borders;
use covid_routes::datasets::cases::CaseTable;
use covid_routes::datasets::manager::DatasetManager;
use covid_routes::fetch::BasicClient;
use covid_routes::geo::resolver;
use covid_routes::infra::aviation_edge::AviationEdgeClient;
use covid_routes::model::{Granularity, RouteRecord};
use covid_routes::output::{read_records, write_records};
use covid_routes::routes::aggregator;
use covid_routes::routes::collector::{self, CollectorConfig, CollectorOutput};
use covid_routes::services::route_api::CannedRouteApi;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "covid_routes")]
#[command(about = "Builds the COVID-19 case and airline-route dataset", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the case datasets named by the URL manifest
    FetchData {
        /// Headerless CSV of dataset_label,url rows
        #[arg(short, long, default_value = "dataset/dataset_urls.csv")]
        manifest: PathBuf,

        /// Directory the datasets are stored in
        #[arg(short, long, default_value = "dataset")]
        dataset_dir: PathBuf,

        /// Re-download when a dataset is older than this many seconds
        #[arg(long, default_value_t = 86400)]
        max_age_secs: i64,

        /// Download even when the files are fresh
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Resolve every airport to its nearest region
    Resolve {
        /// Airport metadata JSON
        #[arg(short, long, default_value = "dataset/airportDatabase.json")]
        airports: PathBuf,

        /// Case table supplying the region centroids
        #[arg(short, long, default_value = "dataset/covid_confirmed.csv")]
        cases: PathBuf,

        /// Where the airport-location table is cached
        #[arg(short, long, default_value = "dataset/airport_to_location.csv")]
        output: PathBuf,

        /// Rebuild even when a cached table exists
        #[arg(long, default_value_t = false)]
        force_rebuild: bool,
    },
    /// Collect outbound routes for every resolved airport
    Routes {
        /// API key for the route service (falls back to AVIATION_EDGE_API_KEY)
        #[arg(short = 'k', long)]
        api_key: Option<String>,

        /// Resolved airport-location table
        #[arg(short, long, default_value = "dataset/airport_to_location.csv")]
        locations: PathBuf,

        /// Where to save the route dataset
        #[arg(short, long, default_value = "dataset/airport_routes.csv")]
        output: PathBuf,

        /// Worker count; one worker aggregates, the rest fetch. Avoid
        /// making this too large and hammering the route service
        #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u64).range(2..))]
        workers: u64,

        /// Fetch attempts per airport before it is dead-lettered
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,

        /// Use canned responses instead of calling the route service
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Aggregate collected routes into weighted region-to-region edges
    Aggregate {
        /// Route dataset produced by the routes subcommand
        #[arg(short, long, default_value = "dataset/airport_routes.csv")]
        routes: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Granularity::County)]
        granularity: Granularity,

        /// Keep only routes with both endpoints in this country
        #[arg(short, long)]
        country: Option<String>,

        #[arg(short, long, default_value = "dataset/route_edges.csv")]
        output: PathBuf,
    },
    /// Build the border-closure JSON dataset
    Borders {
        /// Colon-delimited closures CSV
        #[arg(long, default_value = "dataset/border_closures.csv")]
        closures: PathBuf,

        /// CSV listing the EU member countries
        #[arg(long, default_value = "dataset/eu_countries.csv")]
        eu_countries: PathBuf,

        #[arg(short, long, default_value = "dataset/border_closures.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_routes.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_routes.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::FetchData {
            manifest,
            dataset_dir,
            max_age_secs,
            force,
        } => {
            let manager = DatasetManager::new(dataset_dir, manifest, max_age_secs);
            let client = BasicClient::new();
            manager.ensure(&client, force).await?;
        }
        Commands::Resolve {
            airports,
            cases,
            output,
            force_rebuild,
        } => {
            let table = CaseTable::from_path(&cases)?;
            let regions = resolver::region_centroids(table.observations());
            info!(regions = regions.len(), "Region centroids computed");

            let locations = resolver::load_or_resolve(&output, &airports, &regions, force_rebuild)?;
            info!(airports = locations.len(), "Airport locations ready");
        }
        Commands::Routes {
            api_key,
            locations,
            output,
            workers,
            max_attempts,
            dry_run,
        } => {
            let table = resolver::load_location_table(&locations)?;
            let index = Arc::new(collector::location_index(&table));
            let config = CollectorConfig {
                worker_count: workers as usize,
                max_attempts,
                ..Default::default()
            };

            let collected: CollectorOutput = if dry_run {
                info!("Dry run: using canned route responses");
                collector::collect(Arc::new(CannedRouteApi::default()), table, index, config)
                    .await?
            } else {
                let key = api_key
                    .or_else(|| std::env::var("AVIATION_EDGE_API_KEY").ok())
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "no API key: pass --api-key or set AVIATION_EDGE_API_KEY"
                        )
                    })?;
                let api = AviationEdgeClient::new(&key);
                collector::collect(Arc::new(api), table, index, config).await?
            };

            write_records(&output, &collected.records)?;
            info!(
                path = %output.display(),
                records = collected.records.len(),
                "Route dataset saved"
            );
        }
        Commands::Aggregate {
            routes,
            granularity,
            country,
            output,
        } => {
            let records: Vec<RouteRecord> = read_records(&routes)?;
            let edges = aggregator::aggregate(&records, granularity, country.as_deref());
            write_records(&output, &edges)?;
            info!(path = %output.display(), edges = edges.len(), "Weighted edges saved");
        }
        Commands::Borders {
            closures,
            eu_countries,
            output,
        } => {
            let eu = borders::load_eu_countries(&eu_countries)?;
            let dataset = borders::build(&closures, &eu)?;
            borders::write_json(&output, &dataset)?;
        }
    }

    Ok(())
}
