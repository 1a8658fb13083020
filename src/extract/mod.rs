//! Format extractors for the supported export families.

pub mod address;
pub mod archive;
pub mod kml;
pub mod sheet;
pub mod takeout;

use crate::error::{Error, Result};
use crate::models::Place;

pub use archive::{download_url, fetch_placemark_document, read_placemark_document};
pub use sheet::{extract_facilities, read_rows, FacilityBatch, SheetRow};

/// Extract places from an uploaded KML or KMZ file.
pub fn places_from_placemark_upload(file_name: Option<&str>, bytes: &[u8]) -> Result<Vec<Place>> {
    let xml = read_placemark_document(file_name, bytes)?;
    kml::extract_places(&xml)
}

/// Extract places from a JSON location export.
pub fn places_from_takeout_upload(bytes: &[u8]) -> Result<Vec<Place>> {
    takeout::extract_places_from_bytes(bytes)
}

/// Fail with `NoDataFound` when an extractor produced nothing.
pub fn require_places(places: Vec<Place>, source: &str) -> Result<Vec<Place>> {
    if places.is_empty() {
        return Err(Error::NoDataFound(format!(
            "no placemarks with a location or address in {}",
            source
        )));
    }
    Ok(places)
}
