//! Place extraction from JSON location exports (Google Takeout and similar).
//!
//! Three layouts are recognized, in this order: a GeoJSON FeatureCollection, a
//! top-level array of items, and an object with a `places` array.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Coordinates, Place};

const TITLE_KEYS: &[&str] = &["Title", "name", "Name", "title"];
const ADDRESS_KEYS: &[&str] = &["address", "Address", "location"];
const URL_KEYS: &[&str] = &["Google Maps URL", "google_maps_url"];
const ITEM_TITLE_KEYS: &[&str] = &["title", "name", "Title"];
const ITEM_URL_KEYS: &[&str] = &["url", "Google Maps URL", "googleMapsUrl"];

/// Parse a JSON export and extract its place candidates.
pub fn extract_places_from_bytes(bytes: &[u8]) -> Result<Vec<Place>> {
    let text = String::from_utf8_lossy(bytes);
    let data: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| Error::Format(format!("invalid JSON: {}", e)))?;
    extract_places(&data)
}

/// Extract place candidates from parsed JSON.
///
/// Fails with `NoDataFound` when none of the layouts yields a record.
pub fn extract_places(data: &Value) -> Result<Vec<Place>> {
    let places = if let Some(features) = feature_collection(data) {
        debug!("Reading FeatureCollection with {} features", features.len());
        from_features(features)
    } else if let Some(items) = data.as_array() {
        debug!("Reading item array with {} entries", items.len());
        from_items(items)
    } else if let Some(items) = data.get("places").and_then(Value::as_array) {
        debug!("Reading places array with {} entries", items.len());
        from_items(items)
    } else {
        Vec::new()
    };

    if places.is_empty() {
        return Err(Error::NoDataFound(
            "no saved places found; export \"Saved places\" from Google Takeout as JSON"
                .to_string(),
        ));
    }
    Ok(places)
}

fn feature_collection(data: &Value) -> Option<&Vec<Value>> {
    if data.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return None;
    }
    data.get("features").and_then(Value::as_array)
}

fn from_features(features: &[Value]) -> Vec<Place> {
    let mut places = Vec::new();

    for feature in features {
        if feature.get("type").and_then(Value::as_str) != Some("Feature") {
            continue;
        }
        let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
            continue;
        };
        let empty = Value::Null;
        let props = feature.get("properties").unwrap_or(&empty);

        let coordinates = if geometry.get("type").and_then(Value::as_str) == Some("Point") {
            geometry
                .get("coordinates")
                .and_then(Value::as_array)
                .and_then(|c| lng_lat_pair(c))
        } else {
            None
        };

        let url = first_str(props, URL_KEYS);
        let name = first_str(props, TITLE_KEYS)
            .or_else(|| nested_str(props, "Location", "Business Name"))
            .or_else(|| nested_str(props, "location", "name"))
            .or_else(|| url.and_then(last_path_segment))
            .map(str::to_string)
            .unwrap_or_else(|| numbered_name(places.len()));

        let address = nested_str(props, "Location", "Address")
            .or_else(|| nested_str(props, "location", "address"))
            .or_else(|| first_str(props, ADDRESS_KEYS))
            .map(str::to_string);

        let description = address
            .as_deref()
            .or_else(|| first_str(props, &["Comment", "description"]))
            .unwrap_or("");

        places.push(
            Place::new(name, description)
                .with_coordinates(coordinates)
                .with_address(address)
                .with_url(url.map(str::to_string)),
        );
    }

    places
}

fn from_items(items: &[Value]) -> Vec<Place> {
    let mut places = Vec::new();

    for item in items {
        if !item.is_object() {
            continue;
        }

        let name = first_str(item, ITEM_TITLE_KEYS)
            .map(str::to_string)
            .unwrap_or_else(|| numbered_name(places.len()));
        let address = first_str(item, &["address"]).map(str::to_string);
        let description = address
            .as_deref()
            .or_else(|| first_str(item, &["description"]))
            .unwrap_or("");
        let url = first_str(item, ITEM_URL_KEYS).map(str::to_string);

        places.push(
            Place::new(name, description)
                .with_coordinates(item_coordinates(item))
                .with_address(address)
                .with_url(url),
        );
    }

    places
}

/// Coordinates of an array/places item, trying the accepted spellings in order.
fn item_coordinates(item: &Value) -> Option<Coordinates> {
    if let Some(location) = item.get("geometry").and_then(|g| g.get("location")) {
        return lat_lng(location, &["lat"], &["lng"]);
    }
    if let Some(location) = item.get("location").filter(|l| l.is_object()) {
        return lat_lng(location, &["latitude", "lat"], &["longitude", "lng"]);
    }
    lat_lng(item, &["lat"], &["lng"])
}

fn lat_lng(obj: &Value, lat_keys: &[&str], lng_keys: &[&str]) -> Option<Coordinates> {
    let lat = first_number(obj, lat_keys)?;
    let lng = first_number(obj, lng_keys)?;
    let coordinates = Coordinates::new(lat, lng);
    coordinates.is_valid().then_some(coordinates)
}

/// GeoJSON position `[lng, lat, ...]`. Takeout writes `[0, 0]` for places it
/// could not locate, which is treated as missing.
fn lng_lat_pair(position: &[Value]) -> Option<Coordinates> {
    let lng = number(position.first()?)?;
    let lat = number(position.get(1)?)?;
    if lat == 0.0 && lng == 0.0 {
        return None;
    }
    let coordinates = Coordinates::new(lat, lng);
    coordinates.is_valid().then_some(coordinates)
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// First non-zero number among `keys`.
fn first_number(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(number))
        .find(|n| *n != 0.0)
}

/// First non-empty string among `keys`.
fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn nested_str<'a>(obj: &'a Value, outer: &str, inner: &str) -> Option<&'a str> {
    obj.get(outer)
        .and_then(|o| o.get(inner))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn last_path_segment(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

fn numbered_name(emitted: usize) -> String {
    format!("장소 {}", emitted + 1)
}
