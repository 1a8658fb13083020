//! Coordinates embedded in map-share URLs.
//!
//! Used after provider geocoding for places that still lack coordinates but came
//! with a share link. Short links are expanded over HTTP first.

use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::orchestrator::GeocodeOutcome;
use crate::error::{Error, Result};
use crate::models::{Coordinates, Place};

/// Callers process places in chunks of this size and report progress per chunk.
pub const URL_BATCH_SIZE: usize = 20;

const SHORT_LINK_HOSTS: &[&str] = &["goo.gl", "maps.app.goo.gl"];

static DATA_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid regex"));

static AT_SIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("valid regex"));

static QUERY_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](?:q|ll|query)=(-?\d+(?:\.\d+)?)(?:,|%2C)\s*(-?\d+(?:\.\d+)?)")
        .expect("valid regex")
});

/// Pull a lat/lng pair out of a map URL.
///
/// The `!3d..!4d..` form marks the place itself and wins over the `@lat,lng`
/// viewport center.
pub fn coordinates_from_url(url: &str) -> Option<Coordinates> {
    [&*DATA_PARAM, &*AT_SIGN, &*QUERY_PARAM]
        .iter()
        .find_map(|re| {
            let caps = re.captures(url)?;
            let lat = caps[1].parse().ok()?;
            let lng = caps[2].parse().ok()?;
            Some(Coordinates::new(lat, lng))
        })
        .filter(|c| c.is_valid() && !(c.lat == 0.0 && c.lng == 0.0))
}

pub fn is_short_link(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .map(|host| SHORT_LINK_HOSTS.contains(&host.as_str()))
        .unwrap_or(false)
}

pub struct MapUrlResolver {
    client: Client,
}

impl MapUrlResolver {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("placemap/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Follow a short link and look for coordinates in the final URL, then the body.
    async fn expand(&self, url: &str) -> Result<Option<Coordinates>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let final_url = response.url().to_string();
        debug!("Short link {} expanded to {}", url, final_url);
        if let Some(coords) = coordinates_from_url(&final_url) {
            return Ok(Some(coords));
        }

        let body = response.text().await.map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(coordinates_from_url(&body))
    }

    /// Coordinates for one URL, expanding short links when needed.
    pub async fn resolve(&self, url: &str) -> Result<Option<Coordinates>> {
        if is_short_link(url) {
            return self.expand(url).await;
        }
        Ok(coordinates_from_url(url))
    }

    /// Fill in coordinates from each place's URL. Places with coordinates are untouched.
    pub async fn resolve_batch(&self, places: Vec<Place>) -> GeocodeOutcome {
        let mut success_count = 0;
        let mut fail_count = 0;
        let mut out = Vec::with_capacity(places.len());

        for mut place in places {
            if place.has_coordinates() {
                success_count += 1;
                out.push(place);
                continue;
            }

            let found = match place.url.as_deref() {
                Some(url) => match self.resolve(url).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!("Could not read coordinates from {}: {}", url, e);
                        None
                    }
                },
                None => None,
            };

            match found {
                Some(coords) => {
                    place.resolve(coords, None);
                    success_count += 1;
                }
                None => fail_count += 1,
            }
            out.push(place);
        }

        GeocodeOutcome {
            places: out,
            success_count,
            fail_count,
            key_rejected: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_param_wins_over_viewport() {
        let url = "https://www.google.com/maps/place/X/@37.50,127.00,15z/data=!3m1!4b1!4m6!3m5!1s0x0:0x0!8m2!3d37.5665!4d126.978";
        assert_eq!(coordinates_from_url(url), Some(Coordinates::new(37.5665, 126.978)));
    }

    #[test]
    fn test_at_sign() {
        let url = "https://www.google.com/maps/@35.1796,129.0756,14z";
        assert_eq!(coordinates_from_url(url), Some(Coordinates::new(35.1796, 129.0756)));
    }

    #[test]
    fn test_query_param() {
        assert_eq!(
            coordinates_from_url("https://maps.google.com/?q=37.1,127.2"),
            Some(Coordinates::new(37.1, 127.2))
        );
        assert_eq!(
            coordinates_from_url("https://maps.google.com/maps?hl=ko&ll=37.1%2C127.2"),
            Some(Coordinates::new(37.1, 127.2))
        );
    }

    #[test]
    fn test_no_coordinates() {
        assert_eq!(coordinates_from_url("https://maps.google.com/?cid=12345"), None);
        assert_eq!(coordinates_from_url("https://maps.google.com/?q=0,0"), None);
        assert_eq!(coordinates_from_url("https://maps.google.com/?q=95.0,10.0"), None);
    }

    #[test]
    fn test_short_links() {
        assert!(is_short_link("https://maps.app.goo.gl/abcdef"));
        assert!(is_short_link("https://goo.gl/maps/xyz"));
        assert!(!is_short_link("https://www.google.com/maps/@37.1,127.1,10z"));
        assert!(!is_short_link("not a url"));
    }

    #[tokio::test]
    async fn test_resolve_batch_offline() {
        let resolver = MapUrlResolver::new(Duration::from_secs(1)).unwrap();
        let done = Place::new("done", "").with_coordinates(Some(Coordinates::new(1.0, 2.0)));
        let from_url = Place::new("url", "")
            .with_coordinates(None)
            .with_url(Some("https://www.google.com/maps/@37.2,127.3,10z".to_string()));
        let no_url = Place::new("none", "").with_coordinates(None);

        let outcome = resolver
            .resolve_batch(vec![done.clone(), from_url, no_url])
            .await;

        assert_eq!(outcome.places[0], done);
        assert_eq!(outcome.places[1].coordinates, Some(Coordinates::new(37.2, 127.3)));
        assert!(!outcome.places[1].needs_geocode);
        assert!(outcome.places[2].coordinates.is_none());
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.fail_count, 1);
    }
}
