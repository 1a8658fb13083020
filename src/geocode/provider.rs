//! Geocode provider capability.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::Coordinates;

/// Errors that can occur during a single provider lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The lookup ran but found nothing; the fallback chain continues
    #[error("no match")]
    NoMatch,
    /// Network failure, server error or unusable response
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The credential was refused; every further call would fail the same way
    #[error("provider rejected the credential: {0}")]
    Rejected(String),
}

/// A resolved location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResult {
    pub coordinates: Coordinates,
    /// Provider's canonical address for the hit
    pub resolved_address: Option<String>,
}

/// Address and keyword search backend.
///
/// Implementors only perform single lookups; pacing and fallback order are the
/// orchestrator's job.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Returns the provider's name for logging.
    fn name(&self) -> &str;

    /// Free-text place/keyword search.
    async fn search_by_keyword(&self, text: &str) -> Result<GeocodeResult, ProviderError>;

    /// Structured address search.
    async fn search_by_address(&self, text: &str) -> Result<GeocodeResult, ProviderError>;
}
