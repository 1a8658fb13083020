//! HTTP API for place import, geocoding and nearby restroom lookup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use placemap::config::Config;
use placemap::geocode::{MapUrlResolver, RateLimiter};
use placemap::store::{FacilityStore, PlaceStore};

mod handlers;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Place import and nearby restroom server")]
struct Args {
    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Directory holding the JSON documents (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "debug")]
    log_level: String,
}

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub places: PlaceStore,
    pub facilities: FacilityStore,
    pub http: reqwest::Client,
    pub map_urls: MapUrlResolver,
    /// One call budget for every request, whichever key it uses
    pub limiter: Arc<RateLimiter>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = &args.listen {
        config.server.listen = listen.parse().context("Invalid listen address")?;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }

    info!("Placemap Server");
    info!("Data directory: {}", config.storage.data_dir.display());
    if config.geocode.kakao_api_key.is_none() {
        info!("No Kakao API key configured; geocoding requests must carry one");
    }

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .context("Failed to create data directory")?;

    let timeout = Duration::from_secs(config.geocode.timeout_secs);
    let http = reqwest::Client::builder()
        .user_agent(concat!("placemap/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let state = Arc::new(AppState {
        places: PlaceStore::open(&config.storage.data_dir),
        facilities: FacilityStore::open(&config.storage.data_dir),
        http,
        map_urls: MapUrlResolver::new(timeout)?,
        limiter: Arc::new(RateLimiter::new(Duration::from_millis(config.geocode.interval_ms))),
        config,
    });

    let listen = state.config.server.listen;
    let body_limit = state.config.server.max_upload_bytes;

    // Build router
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/parse-kml", post(handlers::parse_kml))
        .route("/api/parse-kml-url", post(handlers::parse_kml_url))
        .route("/api/parse-takeout", post(handlers::parse_takeout))
        .route("/api/geocode", post(handlers::geocode))
        .route("/api/geocode-batch", post(handlers::geocode_batch))
        .route("/api/extract-coords-batch", post(handlers::extract_coords_batch))
        .route(
            "/api/places",
            get(handlers::list_places)
                .post(handlers::replace_places)
                .delete(handlers::clear_places),
        )
        .route(
            "/api/toilets",
            get(handlers::list_toilets).delete(handlers::clear_toilets),
        )
        .route("/api/parse-toilet", post(handlers::parse_toilet))
        .route("/api/toilets/nearby", get(handlers::nearby_toilets))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
