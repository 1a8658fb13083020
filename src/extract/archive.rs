//! Placemark document sources: raw KML, KMZ archives and shared map links.

use reqwest::Client;
use std::io::{Cursor, Read};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Largest decompressed KML document accepted from a KMZ archive.
pub const MAX_KML_BYTES: u64 = 64 * 1024 * 1024;

/// Whether the payload should be treated as a KMZ archive.
pub fn is_kmz(file_name: Option<&str>, bytes: &[u8]) -> bool {
    file_name
        .map(|n| n.to_ascii_lowercase().ends_with(".kmz"))
        .unwrap_or(false)
        || bytes.starts_with(ZIP_MAGIC)
}

/// Return the KML text of an uploaded or downloaded placemark source.
pub fn read_placemark_document(file_name: Option<&str>, bytes: &[u8]) -> Result<String> {
    if is_kmz(file_name, bytes) {
        return unpack_kmz(bytes);
    }
    let text = String::from_utf8_lossy(bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Decode the first `.kml` entry of a KMZ archive.
pub fn unpack_kmz(bytes: &[u8]) -> Result<String> {
    unpack_kmz_limited(bytes, MAX_KML_BYTES)
}

fn unpack_kmz_limited(bytes: &[u8], limit: u64) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Format(format!("unreadable KMZ archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Format(format!("unreadable KMZ entry {}: {}", i, e)))?;
        if !entry.name().to_ascii_lowercase().ends_with(".kml") {
            continue;
        }

        let name = entry.name().to_string();
        debug!("Using KMZ entry {}", name);
        // The declared size can lie, so the read itself is capped.
        let mut raw = Vec::new();
        (&mut entry)
            .take(limit + 1)
            .read_to_end(&mut raw)
            .map_err(|e| Error::Format(format!("failed to read {}: {}", name, e)))?;
        if raw.len() as u64 > limit {
            return Err(Error::Format(format!("{} inflates past {} bytes", name, limit)));
        }
        return Ok(String::from_utf8_lossy(&raw).into_owned());
    }

    Err(Error::Format("no KML document inside KMZ archive".to_string()))
}

/// Rewrite a shared My Maps link into its KML download form.
///
/// Links without a `mid` parameter are returned unchanged.
pub fn download_url(shared: &str) -> String {
    if !shared.contains("google.com/maps/d/") {
        return shared.to_string();
    }

    let mid = Url::parse(shared).ok().and_then(|url| {
        url.query_pairs()
            .find(|(key, _)| key == "mid")
            .map(|(_, value)| value.into_owned())
    });

    match mid {
        Some(mid) if !mid.is_empty() => format!(
            "https://www.google.com/maps/d/kml?mid={}&forcekml=1",
            urlencode_component(&mid)
        ),
        _ => shared.to_string(),
    }
}

fn urlencode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Download a placemark source, following the share-link rewrite.
pub async fn fetch_placemark_document(client: &Client, shared_url: &str) -> Result<String> {
    let target = download_url(shared_url);
    info!("Fetching placemark document from {}", target);

    let response = client
        .get(&target)
        .send()
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::Fetch(format!(
            "{} returned status {}",
            target,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;
    read_placemark_document(None, &bytes)
}
