//! Tiered geocoding over a batch of places.

use futures::stream::{self, StreamExt};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::kakao::KakaoProvider;
use super::limiter::RateLimiter;
use super::provider::{GeocodeProvider, GeocodeResult, ProviderError};
use crate::config::GeocodeConfig;
use crate::error::{Error, Result};
use crate::models::Place;

/// Result of a batch resolve. `places` keeps the input order.
#[derive(Debug, Clone)]
pub struct GeocodeOutcome {
    pub places: Vec<Place>,
    pub success_count: usize,
    pub fail_count: usize,
    /// Set when the provider refused the credential partway through
    pub key_rejected: Option<String>,
}

impl GeocodeOutcome {
    /// Places that ended up with coordinates, in input order.
    pub fn resolved(&self) -> impl Iterator<Item = &Place> {
        self.places.iter().filter(|p| p.has_coordinates())
    }

    /// Keep only the places that ended up with coordinates.
    ///
    /// The counts still describe the whole batch.
    pub fn into_resolved(self) -> Vec<Place> {
        self.places.into_iter().filter(Place::has_coordinates).collect()
    }
}

enum Tier {
    Keyword,
    Address,
}

pub struct GeocodeOrchestrator {
    provider: Arc<dyn GeocodeProvider>,
    limiter: Arc<RateLimiter>,
    concurrency: usize,
}

impl GeocodeOrchestrator {
    pub fn new(provider: Arc<dyn GeocodeProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            provider,
            limiter,
            concurrency: 1,
        }
    }

    /// Build a Kakao-backed orchestrator.
    ///
    /// `api_key` overrides the configured key. Fails with `Configuration` when
    /// neither is set, before any provider call.
    pub fn from_config(config: &GeocodeConfig, api_key: Option<&str>) -> Result<Self> {
        let limiter = RateLimiter::new(Duration::from_millis(config.interval_ms));
        Self::with_shared_limiter(config, api_key, Arc::new(limiter))
    }

    /// Like `from_config`, pacing calls through an existing limiter.
    pub fn with_shared_limiter(
        config: &GeocodeConfig,
        api_key: Option<&str>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or(config.kakao_api_key.as_deref())
            .ok_or_else(|| Error::Configuration("Kakao API key is not set".to_string()))?;

        let provider = KakaoProvider::new(key, Duration::from_secs(config.timeout_secs))?
            .with_base_url(&config.kakao_base_url);

        Ok(Self::new(Arc::new(provider), limiter).with_concurrency(config.concurrency))
    }

    /// Process up to `n` places at once. All of them still share one limiter.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn call(&self, tier: Tier, text: &str) -> std::result::Result<GeocodeResult, ProviderError> {
        self.limiter.acquire().await;
        match tier {
            Tier::Keyword => self.provider.search_by_keyword(text).await,
            Tier::Address => self.provider.search_by_address(text).await,
        }
    }

    async fn lookup(&self, place: &Place) -> std::result::Result<GeocodeResult, ProviderError> {
        if let Some(name) = place.search_name() {
            match self.call(Tier::Keyword, name).await {
                Err(ProviderError::NoMatch) => {}
                other => return other,
            }
        }

        let Some(address) = place.search_address() else {
            return Err(ProviderError::NoMatch);
        };

        match self.call(Tier::Address, address).await {
            Err(ProviderError::NoMatch) => self.call(Tier::Keyword, address).await,
            other => other,
        }
    }

    /// Resolve one place. Returns whether it ends up with coordinates.
    ///
    /// Once `rejected` is set, unresolved places fail without calling the provider.
    async fn resolve_place(&self, mut place: Place, rejected: &OnceLock<String>) -> (Place, bool) {
        if place.has_coordinates() {
            place.needs_geocode = false;
            return (place, true);
        }
        if place.search_name().is_none() && place.search_address().is_none() {
            debug!("Skipping place with neither name nor address");
            return (place, false);
        }
        if rejected.get().is_some() {
            return (place, false);
        }

        match self.lookup(&place).await {
            Ok(hit) => {
                debug!("Resolved {} via {}", place.name, self.provider.name());
                place.resolve(hit.coordinates, hit.resolved_address);
                (place, true)
            }
            Err(ProviderError::NoMatch) => {
                debug!("No match for {}", place.name);
                (place, false)
            }
            Err(ProviderError::Unavailable(msg)) => {
                warn!("Geocoding failed for {}: {}", place.name, msg);
                (place, false)
            }
            Err(ProviderError::Rejected(msg)) => {
                if rejected.set(msg.clone()).is_ok() {
                    error!(
                        "{} refused the API key, skipping the rest of the batch: {}",
                        self.provider.name(),
                        msg
                    );
                }
                (place, false)
            }
        }
    }

    /// Resolve every place lacking coordinates; resolved places pass through untouched.
    pub async fn resolve_batch(&self, places: Vec<Place>) -> GeocodeOutcome {
        let pending = places.iter().filter(|p| !p.has_coordinates()).count();
        info!(
            "Geocoding {} of {} places with {} (concurrency {})",
            pending,
            places.len(),
            self.provider.name(),
            self.concurrency
        );

        let rejected = OnceLock::new();
        let results: Vec<(Place, bool)> = stream::iter(places)
            .map(|place| self.resolve_place(place, &rejected))
            .buffered(self.concurrency)
            .collect()
            .await;

        let success_count = results.iter().filter(|(_, ok)| *ok).count();
        let fail_count = results.len() - success_count;
        info!("Geocoding done: {} succeeded, {} failed", success_count, fail_count);

        GeocodeOutcome {
            places: results.into_iter().map(|(place, _)| place).collect(),
            success_count,
            fail_count,
            key_rejected: rejected.into_inner(),
        }
    }

    /// Single lookup: address search, then keyword search.
    ///
    /// Returns `Ok(None)` when both tiers find nothing.
    pub async fn resolve_one(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Format("address is empty".to_string()));
        }

        let result = match self.call(Tier::Address, address).await {
            Err(ProviderError::NoMatch) => self.call(Tier::Keyword, address).await,
            other => other,
        };

        match result {
            Ok(hit) => Ok(Some(hit)),
            Err(ProviderError::NoMatch) => Ok(None),
            Err(ProviderError::Unavailable(msg)) => Err(Error::ProviderUnavailable(msg)),
            Err(ProviderError::Rejected(msg)) => Err(Error::Configuration(msg)),
        }
    }
}
