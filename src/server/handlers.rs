//! Request handlers and the JSON error envelope.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use placemap::extract::{self, kml};
use placemap::geocode::{GeocodeOrchestrator, GeocodeOutcome};
use placemap::models::{Coordinates, Facility, Place};
use placemap::proximity::NearbyFacility;
use placemap::store::IngestSummary;
use placemap::Region;

use crate::AppState;

const DEFAULT_RADIUS_M: u64 = 500;

/// Error response: `{ "error": message }` with a status derived from the error kind.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<placemap::Error> for ApiError {
    fn from(err: placemap::Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if err.is_upstream_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed ({}): {}", self.status, self.message);
        } else {
            warn!("Request rejected ({}): {}", self.status, self.message);
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// The uploaded `file` field: original file name and contents.
async fn read_upload(mut multipart: Multipart) -> Result<(Option<String>, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes));
    }
    Err(placemap::Error::Format("no file was uploaded".to_string()).into())
}

fn upload_label(kind: &str, file_name: Option<&str>) -> String {
    format!("{}: {}", kind, file_name.unwrap_or("upload"))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct PlacesResponse {
    success: bool,
    places: Vec<Place>,
}

pub async fn parse_kml(multipart: Multipart) -> ApiResult<PlacesResponse> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let places = extract::places_from_placemark_upload(file_name.as_deref(), &bytes)?;
    let places = extract::require_places(places, &upload_label("KML", file_name.as_deref()))?;

    info!("Parsed {} places from {:?}", places.len(), file_name);
    Ok(Json(PlacesResponse {
        success: true,
        places,
    }))
}

#[derive(Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    url: String,
}

pub async fn parse_kml_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UrlRequest>,
) -> ApiResult<PlacesResponse> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(placemap::Error::Format("url is required".to_string()).into());
    }

    let xml = extract::fetch_placemark_document(&state.http, url).await?;
    let places = extract::require_places(kml::extract_places(&xml)?, url)?;

    Ok(Json(PlacesResponse {
        success: true,
        places,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoutResponse {
    success: bool,
    count: usize,
    with_coordinates: usize,
    needs_geocode: usize,
    places: Vec<Place>,
}

pub async fn parse_takeout(multipart: Multipart) -> ApiResult<TakeoutResponse> {
    let (_, bytes) = read_upload(multipart).await?;
    let places = extract::places_from_takeout_upload(&bytes)?;

    Ok(Json(TakeoutResponse {
        success: true,
        count: places.len(),
        with_coordinates: places.iter().filter(|p| p.has_coordinates()).count(),
        needs_geocode: places.iter().filter(|p| p.needs_geocode).count(),
        places,
    }))
}

fn orchestrator(state: &AppState, api_key: Option<&str>) -> Result<GeocodeOrchestrator, ApiError> {
    Ok(GeocodeOrchestrator::with_shared_limiter(
        &state.config.geocode,
        api_key,
        Arc::clone(&state.limiter),
    )?)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeRequest {
    #[serde(default)]
    address: String,
    #[serde(default)]
    kakao_api_key: Option<String>,
}

#[derive(Serialize)]
pub struct GeocodeResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GeocodeRequest>,
) -> ApiResult<GeocodeResponse> {
    let orch = orchestrator(&state, req.kakao_api_key.as_deref())?;

    let response = match orch.resolve_one(&req.address).await? {
        Some(hit) => GeocodeResponse {
            success: true,
            coordinates: Some(hit.coordinates),
            address: Some(hit.resolved_address.unwrap_or_else(|| req.address.clone())),
            error: None,
        },
        None => GeocodeResponse {
            success: false,
            coordinates: None,
            address: None,
            error: Some("주소를 찾을 수 없습니다.".to_string()),
        },
    };
    Ok(Json(response))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeBatchRequest {
    #[serde(default)]
    places: Vec<Place>,
    #[serde(default)]
    kakao_api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeBatchResponse {
    success: bool,
    places: Vec<Place>,
    total_processed: usize,
    success_count: usize,
    fail_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<GeocodeOutcome> for GeocodeBatchResponse {
    /// Only resolved places are returned; the counts cover the whole batch.
    fn from(outcome: GeocodeOutcome) -> Self {
        let total_processed = outcome.places.len();
        let success_count = outcome.success_count;
        let fail_count = outcome.fail_count;
        let error = outcome.key_rejected.clone();
        Self {
            success: error.is_none(),
            places: outcome.into_resolved(),
            total_processed,
            success_count,
            fail_count,
            error,
        }
    }
}

pub async fn geocode_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GeocodeBatchRequest>,
) -> ApiResult<GeocodeBatchResponse> {
    let orch = orchestrator(&state, req.kakao_api_key.as_deref())?;
    let outcome = orch.resolve_batch(req.places).await;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
pub struct PlacesRequest {
    #[serde(default)]
    places: Vec<Place>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractCoordsResponse {
    success: bool,
    places: Vec<Place>,
    success_count: usize,
    fail_count: usize,
}

pub async fn extract_coords_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlacesRequest>,
) -> ApiResult<ExtractCoordsResponse> {
    let outcome = state.map_urls.resolve_batch(req.places).await;
    Ok(Json(ExtractCoordsResponse {
        success: true,
        places: outcome.places,
        success_count: outcome.success_count,
        fail_count: outcome.fail_count,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceStoreResponse {
    success: bool,
    count: usize,
    places: Vec<Place>,
    source: Option<String>,
    last_update: Option<DateTime<Utc>>,
}

pub async fn list_places(State(state): State<Arc<AppState>>) -> ApiResult<PlaceStoreResponse> {
    let snapshot = state.places.snapshot().await?;
    Ok(Json(PlaceStoreResponse {
        success: true,
        count: snapshot.places.len(),
        places: snapshot.places,
        source: snapshot.source,
        last_update: snapshot.last_update,
    }))
}

pub async fn replace_places(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlacesRequest>,
) -> ApiResult<PlaceStoreResponse> {
    let snapshot = state.places.replace_all(req.places, req.source).await?;
    Ok(Json(PlaceStoreResponse {
        success: true,
        count: snapshot.places.len(),
        places: snapshot.places,
        source: snapshot.source,
        last_update: snapshot.last_update,
    }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: &'static str,
}

pub async fn clear_places(State(state): State<Arc<AppState>>) -> ApiResult<MessageResponse> {
    state.places.clear().await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "장소 데이터가 초기화되었습니다.",
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToiletsResponse {
    success: bool,
    toilets: Vec<Facility>,
    count: usize,
    last_update: Option<DateTime<Utc>>,
    regions: Vec<Region>,
}

pub async fn list_toilets(State(state): State<Arc<AppState>>) -> ApiResult<ToiletsResponse> {
    let snapshot = state.facilities.snapshot().await?;
    Ok(Json(ToiletsResponse {
        success: true,
        count: snapshot.toilets.len(),
        toilets: snapshot.toilets,
        last_update: snapshot.last_update,
        regions: snapshot.regions,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToiletUploadResponse {
    success: bool,
    toilets: Vec<Facility>,
    count: usize,
    new_count: usize,
    region: Region,
    regions: Vec<Region>,
    last_update: DateTime<Utc>,
}

pub async fn parse_toilet(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<ToiletUploadResponse> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let rows = extract::read_rows(file_name.as_deref(), &bytes)?;
    let batch = extract::extract_facilities(&rows, Utc::now());

    info!(
        "Facility upload {:?}: region {}, {} rows kept, {} dropped",
        file_name,
        batch.region,
        batch.facilities.len(),
        batch.dropped_rows()
    );

    let summary = state
        .facilities
        .ingest_region_batch(batch.region, batch.facilities)
        .await?;
    Ok(Json(summary.into()))
}

impl From<IngestSummary> for ToiletUploadResponse {
    /// The list written by this ingest, not a later re-read of the store.
    fn from(summary: IngestSummary) -> Self {
        Self {
            success: true,
            count: summary.facilities.len(),
            toilets: summary.facilities,
            new_count: summary.added_count,
            region: summary.region,
            regions: summary.regions,
            last_update: summary.last_update,
        }
    }
}

pub async fn clear_toilets(State(state): State<Arc<AppState>>) -> ApiResult<MessageResponse> {
    state.facilities.clear_all().await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "화장실 데이터가 초기화되었습니다.",
    }))
}

#[derive(Deserialize)]
pub struct NearbyParams {
    lat: f64,
    lng: f64,
    radius: Option<u64>,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    success: bool,
    status: &'static str,
    toilets: Vec<NearbyFacility>,
    count: usize,
    radius: u64,
}

pub async fn nearby_toilets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> ApiResult<NearbyResponse> {
    let point = Coordinates::new(params.lat, params.lng);
    if !point.is_valid() {
        return Err(placemap::Error::Format(format!(
            "invalid coordinates: {}, {}",
            params.lat, params.lng
        ))
        .into());
    }
    let radius = params.radius.unwrap_or(DEFAULT_RADIUS_M);

    let result = state.facilities.search_nearby(point, radius).await?;
    let status = result.status();
    let toilets = result.into_facilities();

    Ok(Json(NearbyResponse {
        success: true,
        status,
        count: toilets.len(),
        toilets,
        radius,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn status_of(err: placemap::Error) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    fn facility(idx: usize) -> Facility {
        Facility {
            id: Facility::make_id(Region::Seoul, 1, idx),
            name: format!("화장실 {}", idx),
            address: String::new(),
            region: Region::Seoul,
            lat: 37.5,
            lng: 127.0,
            kind: "공중화장실".to_string(),
            attribute_counts: BTreeMap::new(),
            open_time: "24시간".to_string(),
            manager: String::new(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_client_errors_are_bad_request() {
        assert_eq!(status_of(placemap::Error::Format("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(placemap::Error::NoDataFound("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(placemap::Error::Configuration("x".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_errors_are_bad_gateway() {
        assert_eq!(status_of(placemap::Error::ProviderUnavailable("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(placemap::Error::Fetch("x".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_errors_are_server_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(status_of(placemap::Error::Io(io)), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_batch_response_returns_only_resolved_places() {
        let outcome = GeocodeOutcome {
            places: vec![
                Place::new("a", "").with_coordinates(Some(Coordinates::new(37.5, 127.0))),
                Place::new("b", "").with_coordinates(None),
                Place::new("c", "").with_coordinates(None),
            ],
            success_count: 1,
            fail_count: 2,
            key_rejected: None,
        };

        let response = GeocodeBatchResponse::from(outcome);

        assert!(response.success);
        assert_eq!(response.total_processed, 3);
        assert_eq!(response.success_count, 1);
        assert_eq!(response.fail_count, 2);
        assert_eq!(response.places.len(), 1);
        assert_eq!(response.places[0].name, "a");
        assert!(response.error.is_none());
    }

    #[test]
    fn test_batch_response_reports_rejected_key() {
        let outcome = GeocodeOutcome {
            places: vec![Place::new("a", "").with_coordinates(None)],
            success_count: 0,
            fail_count: 1,
            key_rejected: Some("401".to_string()),
        };

        let response = GeocodeBatchResponse::from(outcome);

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("401"));
        assert!(response.places.is_empty());
    }

    #[test]
    fn test_upload_response_uses_ingested_list() {
        let summary = IngestSummary {
            merged: 2,
            added_count: 1,
            region: Region::Seoul,
            regions: vec![Region::Seoul],
            last_update: Utc::now(),
            facilities: vec![facility(0), facility(1)],
        };

        let response = ToiletUploadResponse::from(summary);

        assert_eq!(response.count, 2);
        assert_eq!(response.toilets.len(), 2);
        assert_eq!(response.new_count, 1);
        assert_eq!(response.toilets[1].name, "화장실 1");
    }
}
