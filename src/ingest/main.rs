//! Command-line ingest for places and restroom registries.
//!
//! Reads export files into the JSON stores, optionally geocoding places that only
//! carry an address, and answers nearby-restroom queries against the store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use placemap::config::Config;
use placemap::extract;
use placemap::geocode::{GeocodeOrchestrator, MapUrlResolver, URL_BATCH_SIZE};
use placemap::models::{Coordinates, Place};
use placemap::proximity::ProximityResult;
use placemap::store::{FacilityStore, PlaceStore};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Import saved places and restroom data into the local stores")]
struct Args {
    /// Optional TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the JSON documents (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a KML, KMZ or Takeout JSON file into the place store
    Places {
        file: PathBuf,

        /// Resolve places without coordinates before storing
        #[arg(long)]
        geocode: bool,

        /// Source label stored with the places
        #[arg(long)]
        source: Option<String>,

        /// Kakao REST API key (falls back to config / KAKAO_API_KEY)
        #[arg(long)]
        kakao_api_key: Option<String>,
    },

    /// Import a shared My Maps link or a KML/KMZ URL into the place store
    PlacesUrl {
        url: String,

        #[arg(long)]
        geocode: bool,

        #[arg(long)]
        kakao_api_key: Option<String>,
    },

    /// Merge a restroom spreadsheet (XLSX/XLS/ODS/CSV) into the facility store
    Facilities { file: PathBuf },

    /// List stored restrooms near a point
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Search radius in meters
        #[arg(long, default_value = "500")]
        radius: u64,
    },

    /// Delete all stored restrooms
    ClearFacilities,

    /// Delete all stored places
    ClearPlaces,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    let data_dir = config.storage.data_dir.clone();

    match args.command {
        Command::Places {
            file,
            geocode,
            source,
            kakao_api_key,
        } => {
            let places = read_place_file(&file)?;
            let source = source.unwrap_or_else(|| default_source(&file));
            let places = if geocode {
                geocode_places(&config, kakao_api_key.as_deref(), places).await?
            } else {
                places
            };
            store_places(&data_dir, places, source).await?;
        }
        Command::PlacesUrl {
            url,
            geocode,
            kakao_api_key,
        } => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("placemap/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(config.geocode.timeout_secs))
                .build()
                .context("Failed to create HTTP client")?;
            let xml = extract::fetch_placemark_document(&client, &url).await?;
            let places = extract::require_places(extract::kml::extract_places(&xml)?, &url)?;
            let places = if geocode {
                geocode_places(&config, kakao_api_key.as_deref(), places).await?
            } else {
                places
            };
            store_places(&data_dir, places, format!("URL: {}", url)).await?;
        }
        Command::Facilities { file } => {
            import_facilities(&data_dir, &file).await?;
        }
        Command::Nearby { lat, lng, radius } => {
            let point = Coordinates::new(lat, lng);
            if !point.is_valid() {
                anyhow::bail!("Invalid coordinates: {}, {}", lat, lng);
            }
            let store = FacilityStore::open(&data_dir);
            print_nearby(store.search_nearby(point, radius).await?, radius);
        }
        Command::ClearFacilities => {
            FacilityStore::open(&data_dir).clear_all().await?;
        }
        Command::ClearPlaces => {
            PlaceStore::open(&data_dir).clear().await?;
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn default_source(path: &Path) -> String {
    let kind = if is_json(path) { "Takeout" } else { "KML" };
    format!("{}: {}", kind, file_name(path).unwrap_or("upload"))
}

fn read_place_file(path: &Path) -> Result<Vec<Place>> {
    info!("Reading places from {}", path.display());
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let places = if is_json(path) {
        extract::places_from_takeout_upload(&bytes)?
    } else {
        let places = extract::places_from_placemark_upload(file_name(path), &bytes)?;
        extract::require_places(places, &path.display().to_string())?
    };

    let pending = places.iter().filter(|p| p.needs_geocode).count();
    info!("Extracted {} places ({} need geocoding)", places.len(), pending);
    Ok(places)
}

fn progress_bar(len: usize, label: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    pb.set_message(label);
    Ok(pb)
}

/// Provider geocoding, then the map-URL fallback for whatever is left.
async fn geocode_places(config: &Config, api_key: Option<&str>, places: Vec<Place>) -> Result<Vec<Place>> {
    let orchestrator = GeocodeOrchestrator::from_config(&config.geocode, api_key)?;

    let pb = progress_bar(places.len(), "geocoding")?;
    let mut resolved = Vec::with_capacity(places.len());
    let mut failed = 0;
    let mut remaining = places.into_iter().peekable();
    while remaining.peek().is_some() {
        let chunk: Vec<Place> = remaining.by_ref().take(URL_BATCH_SIZE).collect();
        let len = chunk.len() as u64;
        let outcome = orchestrator.resolve_batch(chunk).await;
        failed += outcome.fail_count;
        let rejected = outcome.key_rejected.is_some();
        resolved.extend(outcome.places);
        pb.inc(len);
        if rejected {
            // Later chunks would be refused the same way.
            warn!("Kakao API key was rejected, leaving the remaining places unresolved");
            let rest: Vec<Place> = remaining.by_ref().collect();
            failed += rest.iter().filter(|p| !p.has_coordinates()).count();
            pb.inc(rest.len() as u64);
            resolved.extend(rest);
        }
    }
    pb.finish_with_message("geocoding complete");

    if failed == 0 {
        return Ok(resolved);
    }

    let with_url = resolved
        .iter()
        .filter(|p| !p.has_coordinates() && p.url.is_some())
        .count();
    if with_url == 0 {
        warn!("{} places could not be geocoded", failed);
        return Ok(resolved);
    }

    info!("Trying map links for {} unresolved places", with_url);
    let resolver = MapUrlResolver::new(Duration::from_secs(config.geocode.timeout_secs))?;
    let pb = progress_bar(resolved.len(), "map links")?;
    let mut out = Vec::with_capacity(resolved.len());
    let mut still_failed = 0;
    let mut remaining = resolved.into_iter().peekable();
    while remaining.peek().is_some() {
        let chunk: Vec<Place> = remaining.by_ref().take(URL_BATCH_SIZE).collect();
        let len = chunk.len() as u64;
        let outcome = resolver.resolve_batch(chunk).await;
        still_failed += outcome.fail_count;
        out.extend(outcome.places);
        pb.inc(len);
    }
    pb.finish_with_message("map links complete");

    if still_failed > 0 {
        warn!("{} places could not be located", still_failed);
    }
    Ok(out)
}

async fn store_places(data_dir: &Path, places: Vec<Place>, source: String) -> Result<()> {
    let store = PlaceStore::open(data_dir);
    let snapshot = store.replace_all(places, Some(source)).await?;
    info!(
        "Place store now holds {} places from {}",
        snapshot.places.len(),
        snapshot.source.as_deref().unwrap_or("unknown source")
    );
    Ok(())
}

async fn import_facilities(data_dir: &Path, path: &Path) -> Result<()> {
    info!("Reading facilities from {}", path.display());
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let rows = extract::read_rows(file_name(path), &bytes)?;
    let batch = extract::extract_facilities(&rows, Utc::now());
    info!(
        "Region {}: {} usable rows, {} dropped",
        batch.region,
        batch.facilities.len(),
        batch.dropped_rows()
    );

    let store = FacilityStore::open(data_dir);
    let summary = store.ingest_region_batch(batch.region, batch.facilities).await?;
    let regions: Vec<&str> = summary.regions.iter().map(|r| r.as_str()).collect();
    info!(
        "Facility store now holds {} restrooms across [{}]",
        summary.merged,
        regions.join(", ")
    );
    Ok(())
}

fn print_nearby(result: ProximityResult, radius: u64) {
    match result {
        ProximityResult::EmptyStore => {
            println!("No restroom data loaded. Import a registry with `ingest facilities <file>`.");
        }
        ProximityResult::NoneWithinRadius { radius_m } => {
            println!("No restrooms within {} m.", radius_m);
        }
        ProximityResult::Found(found) => {
            println!("{} restrooms within {} m:", found.len(), radius);
            for nearby in found {
                let f = &nearby.facility;
                println!(
                    "{:>6} m  {}  {}  ({})",
                    nearby.distance, f.name, f.address, f.open_time
                );
            }
        }
    }
}
