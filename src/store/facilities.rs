//! Restroom records, merged one region at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

use super::blob::JsonBlobStore;
use crate::error::{Error, Result};
use crate::models::{Coordinates, Facility, FacilitySnapshot};
use crate::proximity::{self, ProximityResult};
use crate::region::Region;

pub const FACILITIES_FILE: &str = "toilets.json";

/// What a regional ingest changed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Facility count after the merge
    pub merged: usize,
    pub added_count: usize,
    pub region: Region,
    pub regions: Vec<Region>,
    pub last_update: DateTime<Utc>,
    /// The full stored list as written by this ingest
    #[serde(skip)]
    pub facilities: Vec<Facility>,
}

/// Drop every facility of `region`, then append `batch` stamped with `region`.
pub fn merge_region(existing: Vec<Facility>, region: Region, batch: Vec<Facility>) -> Vec<Facility> {
    let mut merged: Vec<Facility> = existing.into_iter().filter(|f| f.region != region).collect();
    merged.extend(batch.into_iter().map(|mut f| {
        f.region = region;
        f
    }));
    merged
}

/// Distinct regions, sorted by display name.
pub fn regions_of(facilities: &[Facility]) -> Vec<Region> {
    let mut regions: Vec<Region> = Vec::new();
    for facility in facilities {
        if !regions.contains(&facility.region) {
            regions.push(facility.region);
        }
    }
    regions.sort_by_key(|r| r.as_str());
    regions
}

pub struct FacilityStore {
    blob: JsonBlobStore<FacilitySnapshot>,
    write_lock: Mutex<()>,
}

impl FacilityStore {
    pub fn new(blob: JsonBlobStore<FacilitySnapshot>) -> Self {
        Self {
            blob,
            write_lock: Mutex::new(()),
        }
    }

    pub fn open(data_dir: &Path) -> Self {
        Self::new(JsonBlobStore::new(data_dir.join(FACILITIES_FILE)))
    }

    /// Replace the stored facilities of `region` with `facilities`.
    ///
    /// The lock is held across the read-modify-write so concurrent ingests of
    /// different regions both survive. An empty batch is rejected with
    /// `NoDataFound` and leaves the stored region as it was.
    pub async fn ingest_region_batch(&self, region: Region, facilities: Vec<Facility>) -> Result<IngestSummary> {
        if facilities.is_empty() {
            return Err(Error::NoDataFound(format!(
                "no facilities with valid latitude and longitude for {}",
                region
            )));
        }

        let _guard = self.write_lock.lock().await;

        let current = self.blob.read().await?;
        let before = current.toilets.len();
        let added_count = facilities.len();

        let toilets = merge_region(current.toilets, region, facilities);
        let regions = regions_of(&toilets);
        let last_update = Utc::now();

        let snapshot = FacilitySnapshot {
            toilets,
            regions,
            last_update: Some(last_update),
        };
        self.blob.replace(&snapshot).await?;

        info!(
            "Merged {} facilities for {} ({} -> {} total)",
            added_count,
            region,
            before,
            snapshot.toilets.len()
        );

        Ok(IngestSummary {
            merged: snapshot.toilets.len(),
            added_count,
            region,
            regions: snapshot.regions,
            last_update,
            facilities: snapshot.toilets,
        })
    }

    pub async fn list_all(&self) -> Result<Vec<Facility>> {
        Ok(self.blob.read().await?.toilets)
    }

    pub async fn snapshot(&self) -> Result<FacilitySnapshot> {
        self.blob.read().await
    }

    /// Remove the document entirely.
    pub async fn clear_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.blob.remove().await?;
        info!("Cleared facility store");
        Ok(())
    }

    pub async fn search_nearby(&self, point: Coordinates, radius_m: u64) -> Result<ProximityResult> {
        let facilities = self.list_all().await?;
        Ok(proximity::search(&facilities, point, radius_m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn facility(region: Region, idx: usize, lat: f64, lng: f64) -> Facility {
        Facility {
            id: Facility::make_id(region, 1, idx),
            name: format!("{} {}", region, idx),
            address: String::new(),
            region,
            lat,
            lng,
            kind: "공중화장실".to_string(),
            attribute_counts: BTreeMap::new(),
            open_time: "24시간".to_string(),
            manager: String::new(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_merge_replaces_only_target_region() {
        let existing = vec![
            facility(Region::Seoul, 0, 37.5, 127.0),
            facility(Region::Gyeonggi, 0, 37.3, 127.1),
        ];
        let merged = merge_region(existing, Region::Seoul, vec![facility(Region::Seoul, 9, 37.6, 127.0)]);

        let ids: Vec<&str> = merged.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["경기도_1_0", "서울시_1_9"]);
    }

    #[test]
    fn test_merge_stamps_batch_region() {
        let existing = vec![facility(Region::Seoul, 0, 37.5, 127.0)];
        let mislabeled = vec![facility(Region::Busan, 1, 37.6, 127.0), facility(Region::Other, 2, 37.7, 127.0)];

        let merged = merge_region(existing, Region::Seoul, mislabeled);

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|f| f.region == Region::Seoul));
    }

    #[test]
    fn test_regions_sorted_distinct() {
        let facilities = vec![
            facility(Region::Seoul, 0, 37.5, 127.0),
            facility(Region::Gyeonggi, 0, 37.3, 127.1),
            facility(Region::Seoul, 1, 37.5, 127.0),
        ];
        assert_eq!(regions_of(&facilities), vec![Region::Gyeonggi, Region::Seoul]);
    }

    #[tokio::test]
    async fn test_reingest_replaces_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FacilityStore::open(dir.path());

        store
            .ingest_region_batch(Region::Gyeonggi, vec![facility(Region::Gyeonggi, 0, 37.3, 127.1)])
            .await
            .unwrap();
        store
            .ingest_region_batch(
                Region::Seoul,
                vec![facility(Region::Seoul, 0, 37.5, 127.0), facility(Region::Seoul, 1, 37.6, 127.0)],
            )
            .await
            .unwrap();
        let summary = store
            .ingest_region_batch(Region::Seoul, vec![facility(Region::Seoul, 2, 37.55, 127.0)])
            .await
            .unwrap();

        assert_eq!(summary.merged, 2);
        assert_eq!(summary.added_count, 1);
        assert_eq!(summary.regions, vec![Region::Gyeonggi, Region::Seoul]);
        assert_eq!(summary.facilities.len(), summary.merged);
        assert_eq!(summary.facilities, store.list_all().await.unwrap());

        let all = store.list_all().await.unwrap();
        assert_eq!(all.iter().filter(|f| f.region == Region::Seoul).count(), 1);
        assert_eq!(all.iter().filter(|f| f.region == Region::Gyeonggi).count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_regions_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FacilityStore::open(dir.path()));

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .ingest_region_batch(Region::Busan, vec![facility(Region::Busan, 0, 35.1, 129.0)])
                    .await
            })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .ingest_region_batch(Region::Daegu, vec![facility(Region::Daegu, 0, 35.8, 128.6)])
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.toilets.len(), 2);
        assert_eq!(snapshot.regions.len(), 2);
    }

    #[tokio::test]
    async fn test_search_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FacilityStore::open(dir.path());
        let point = Coordinates::new(37.50, 127.00);

        assert_eq!(store.search_nearby(point, 500).await.unwrap(), ProximityResult::EmptyStore);

        store
            .ingest_region_batch(Region::Seoul, vec![facility(Region::Seoul, 0, 37.50, 127.00)])
            .await
            .unwrap();
        let found = store.search_nearby(point, 1).await.unwrap();
        assert_eq!(found.status(), "found");
        assert_eq!(found.facilities()[0].distance, 0);

        store.clear_all().await.unwrap();
        assert_eq!(store.search_nearby(point, 500).await.unwrap(), ProximityResult::EmptyStore);
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_region() {
        let dir = tempfile::tempdir().unwrap();
        let store = FacilityStore::open(dir.path());
        store
            .ingest_region_batch(Region::Seoul, vec![facility(Region::Seoul, 0, 37.5, 127.0)])
            .await
            .unwrap();
        let before = store.snapshot().await.unwrap();

        let result = store.ingest_region_batch(Region::Seoul, Vec::new()).await;

        assert!(matches!(result, Err(Error::NoDataFound(_))));
        let after = store.snapshot().await.unwrap();
        assert_eq!(after.toilets, before.toilets);
        assert_eq!(after.last_update, before.last_update);
    }

    #[tokio::test]
    async fn test_summary_matches_stored_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FacilityStore::open(dir.path());
        store
            .ingest_region_batch(Region::Daegu, vec![facility(Region::Daegu, 0, 35.8, 128.6)])
            .await
            .unwrap();

        let summary = store
            .ingest_region_batch(Region::Busan, vec![facility(Region::Seoul, 0, 35.1, 129.0)])
            .await
            .unwrap();

        let ids: Vec<&str> = summary.facilities.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["대구시_1_0", "서울시_1_0"]);
        assert_eq!(summary.facilities[1].region, Region::Busan);
        assert_eq!(summary.regions, vec![Region::Daegu, Region::Busan]);
    }
}
