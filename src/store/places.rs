//! The saved-place collection.

use chrono::Utc;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

use super::blob::JsonBlobStore;
use crate::error::Result;
use crate::models::{Place, PlaceSnapshot};

pub const PLACES_FILE: &str = "places.json";

pub struct PlaceStore {
    blob: JsonBlobStore<PlaceSnapshot>,
    write_lock: Mutex<()>,
}

impl PlaceStore {
    pub fn new(blob: JsonBlobStore<PlaceSnapshot>) -> Self {
        Self {
            blob,
            write_lock: Mutex::new(()),
        }
    }

    pub fn open(data_dir: &Path) -> Self {
        Self::new(JsonBlobStore::new(data_dir.join(PLACES_FILE)))
    }

    /// Replace the whole collection.
    ///
    /// Places without coordinates are dropped. Returns the stored snapshot.
    pub async fn replace_all(&self, places: Vec<Place>, source: Option<String>) -> Result<PlaceSnapshot> {
        let _guard = self.write_lock.lock().await;

        let total = places.len();
        let places: Vec<Place> = places
            .into_iter()
            .filter(Place::has_coordinates)
            .map(|mut p| {
                p.needs_geocode = false;
                p
            })
            .collect();

        let snapshot = PlaceSnapshot {
            places,
            source,
            last_update: Some(Utc::now()),
        };
        self.blob.replace(&snapshot).await?;

        info!(
            "Stored {} places ({} dropped without coordinates)",
            snapshot.places.len(),
            total - snapshot.places.len()
        );
        Ok(snapshot)
    }

    pub async fn list(&self) -> Result<Vec<Place>> {
        Ok(self.blob.read().await?.places)
    }

    pub async fn snapshot(&self) -> Result<PlaceSnapshot> {
        self.blob.read().await
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.blob.remove().await?;
        info!("Cleared place store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;

    #[tokio::test]
    async fn test_replace_drops_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaceStore::open(dir.path());

        let mut resolved = Place::new("a", "").with_coordinates(Some(Coordinates::new(37.0, 127.0)));
        resolved.needs_geocode = true;
        let unresolved = Place::new("b", "").with_coordinates(None);

        let snapshot = store
            .replace_all(vec![resolved, unresolved], Some("KML: test.kml".to_string()))
            .await
            .unwrap();

        assert_eq!(snapshot.places.len(), 1);
        assert!(!snapshot.places[0].needs_geocode);
        assert!(snapshot.last_update.is_some());

        let listed = store.list().await.unwrap();
        assert_eq!(listed, snapshot.places);
        assert_eq!(store.snapshot().await.unwrap().source.as_deref(), Some("KML: test.kml"));
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaceStore::open(dir.path());
        let place = |n: &str| Place::new(n, "").with_coordinates(Some(Coordinates::new(37.0, 127.0)));

        store.replace_all(vec![place("a"), place("b")], None).await.unwrap();
        store.replace_all(vec![place("c")], None).await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["c"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaceStore::open(dir.path());
        store
            .replace_all(vec![Place::new("a", "").with_coordinates(Some(Coordinates::new(1.0, 1.0)))], None)
            .await
            .unwrap();

        store.clear().await.unwrap();
        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.places.is_empty());
        assert!(snapshot.last_update.is_none());
    }
}
