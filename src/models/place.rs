//! Place records produced by the extractors and kept in the place store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name given to placemarks that carry no name of their own.
pub const UNNAMED_PLACE: &str = "이름 없음";

/// Geographic point (lat/lng, WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS84 value ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A place candidate from one of the supported export formats.
///
/// `needs_geocode` is only meaningful between extraction and geocoding; the place
/// store never keeps a place without coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    /// Free-text address, either from the source or recovered from the description
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub needs_geocode: bool,

    /// Map-share link for the place (Takeout exports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Canonical address reported by the geocode provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoded_address: Option<String>,
}

impl Place {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            coordinates: None,
            address: None,
            needs_geocode: false,
            url: None,
            geocoded_address: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.coordinates = coordinates;
        self.needs_geocode = self.coordinates.is_none();
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    /// Name usable as a search query, if any.
    pub fn search_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Address usable as a search query, if any.
    pub fn search_address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Record a resolved location and clear the geocode flag.
    pub fn resolve(&mut self, coordinates: Coordinates, geocoded_address: Option<String>) {
        self.coordinates = Some(coordinates);
        self.needs_geocode = false;
        if geocoded_address.is_some() {
            self.geocoded_address = geocoded_address;
        }
    }
}

/// Persisted place document: `{ places, source, lastUpdate }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSnapshot {
    #[serde(default)]
    pub places: Vec<Place>,

    /// Human-readable origin of the data, e.g. "Takeout: saved.json"
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}
