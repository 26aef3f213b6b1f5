pub mod types;
pub mod config;
pub mod error;
pub mod client;
pub mod geocode;
pub mod overpass;
pub mod area;
pub mod style;
pub mod processing;
pub mod render;
pub mod search;
pub mod session;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::geocode::Geocoder;
use crate::overpass::BuildingSource;
use crate::search::{SearchPipeline, SearchRequest};
use crate::session::MapSession;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find buildings around an address and write them as GeoJSON layers
    Search {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,

        /// Free-text address to centre the search on
        #[arg(short, long)]
        address: String,

        /// Buildings at or below this area (m²) are left out
        #[arg(short, long, default_value_t = 0.0)]
        min_area: f64,

        #[arg(short, long, value_name = "FILE", default_value = "buildings.geojson")]
        output: PathBuf,
    },
    /// Serve the search API for a web map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search { config, address, min_area, output } => {
            let app_config = config::AppConfig::load_or_default(&config)?;
            let pipeline = SearchPipeline::from_config(&app_config)?;

            println!("Searching for buildings near {:?} larger than {} m²...", address, min_area);
            let written = search_to_file(&pipeline, SearchRequest { address, min_area }, &output).await?;
            println!("Wrote {} buildings to {:?}", written, output);
        }
        Commands::Serve { config } => {
            println!("Serving building search with config: {:?}", config);
            let app_config = config::AppConfig::load_or_default(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}

/// Runs one search and writes the rendered layers to `output`.
/// A failed search leaves `output` untouched.
async fn search_to_file<G: Geocoder, B: BuildingSource>(
    pipeline: &SearchPipeline<G, B>,
    request: SearchRequest,
    output: &Path,
) -> anyhow::Result<usize> {
    let mut session = MapSession::new();
    let token = session.begin();
    let outcome = pipeline
        .run(&request)
        .await
        .map_err(|err| {
            let message = err.user_message();
            anyhow::Error::new(err).context(message)
        })?;
    session.commit(token, Ok(outcome));

    if let Some(message) = session.message() {
        println!("{}", message);
    }
    for summary in session.layers().summaries() {
        if summary.polygons > 0 {
            println!("  {:<12} {}", summary.label, summary.polygons);
        }
    }
    let ungrouped = session.layers().ungrouped().len();
    if ungrouped > 0 {
        println!("  {:<12} {}", "Other", ungrouped);
    }

    let collection = session.layers().to_feature_collection();
    let json = serde_json::to_string_pretty(&collection)?;
    std::fs::write(output, json).with_context(|| format!("Failed to write {:?}", output))?;
    Ok(collection.features.len())
}
