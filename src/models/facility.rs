//! Public restroom records and the persisted facility document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Coordinates;
use crate::region::Region;

/// A public restroom from a regional open-data registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    /// "{region}_{ingestTimestampMillis}_{rowIndex}"
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub address: String,

    pub region: Region,

    pub lat: f64,

    pub lng: f64,

    /// Registry category (public / open / ...)
    #[serde(default)]
    pub kind: String,

    /// Fixture counts: maleToilet, maleUrinal, femaleToilet, disabledToilet
    #[serde(default)]
    pub attribute_counts: BTreeMap<String, u32>,

    #[serde(default)]
    pub open_time: String,

    #[serde(default)]
    pub manager: String,

    #[serde(default)]
    pub phone: String,
}

impl Facility {
    pub fn make_id(region: Region, ingest_millis: i64, row_index: usize) -> String {
        format!("{}_{}_{}", region, ingest_millis, row_index)
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// Persisted facility document: `{ toilets, regions, lastUpdate }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitySnapshot {
    #[serde(default)]
    pub toilets: Vec<Facility>,

    /// Sorted distinct regions present in `toilets`
    #[serde(default)]
    pub regions: Vec<Region>,

    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        assert_eq!(
            Facility::make_id(Region::Seoul, 1700000000000, 7),
            "서울시_1700000000000_7"
        );
    }

    #[test]
    fn test_snapshot_layout() {
        let snapshot = FacilitySnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["toilets"].as_array().unwrap().is_empty());
        assert!(json["regions"].as_array().unwrap().is_empty());
        assert!(json["lastUpdate"].is_null());
    }
}
