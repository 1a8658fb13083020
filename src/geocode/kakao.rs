//! Kakao Local search API provider.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::provider::{GeocodeProvider, GeocodeResult, ProviderError};
use crate::error::{Error, Result};
use crate::models::Coordinates;

pub const KAKAO_LOCAL_BASE_URL: &str = "https://dapi.kakao.com/v2/local/search";

pub struct KakaoProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<SearchDocument>,
}

#[derive(Debug, Deserialize)]
struct SearchDocument {
    /// Longitude, as a decimal string
    x: String,
    /// Latitude, as a decimal string
    y: String,
    #[serde(default)]
    address_name: Option<String>,
    #[serde(default)]
    road_address_name: Option<String>,
}

impl KakaoProvider {
    /// Create a provider for the given REST API key.
    ///
    /// A blank key is a configuration error, reported before any request is made.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::Configuration("Kakao API key is not set".to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("placemap/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: KAKAO_LOCAL_BASE_URL.to_string(),
        })
    }

    /// Point the provider at another endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn search(&self, kind: &str, query: &str) -> std::result::Result<GeocodeResult, ProviderError> {
        let endpoint = format!("{}/{}.json", self.base_url, kind);
        let url = Url::parse_with_params(&endpoint, &[("query", query)])
            .map_err(|e| ProviderError::Unavailable(format!("invalid endpoint {}: {}", endpoint, e)))?;
        debug!("Kakao {} search: {}", kind, query);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("invalid response: {}", e)))?;

        let doc = data.documents.into_iter().next().ok_or(ProviderError::NoMatch)?;
        document_to_result(doc)
    }
}

/// 401/403 mean the key itself is bad; anything else may be transient.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Rejected(format!("Kakao API rejected the key ({}): {}", status, body))
        }
        _ => ProviderError::Unavailable(format!("Kakao API error {}: {}", status, body)),
    }
}

fn document_to_result(doc: SearchDocument) -> std::result::Result<GeocodeResult, ProviderError> {
    let lng: f64 = doc.x.trim().parse().map_err(|_| {
        ProviderError::Unavailable(format!("invalid longitude in response: {}", doc.x))
    })?;
    let lat: f64 = doc.y.trim().parse().map_err(|_| {
        ProviderError::Unavailable(format!("invalid latitude in response: {}", doc.y))
    })?;

    let resolved_address = doc
        .address_name
        .filter(|a| !a.is_empty())
        .or(doc.road_address_name.filter(|a| !a.is_empty()));

    Ok(GeocodeResult {
        coordinates: Coordinates::new(lat, lng),
        resolved_address,
    })
}

#[async_trait]
impl GeocodeProvider for KakaoProvider {
    fn name(&self) -> &str {
        "kakao"
    }

    async fn search_by_keyword(&self, text: &str) -> std::result::Result<GeocodeResult, ProviderError> {
        self.search("keyword", text).await
    }

    async fn search_by_address(&self, text: &str) -> std::result::Result<GeocodeResult, ProviderError> {
        self.search("address", text).await
    }
}
