//! Nearby facility search around a selected place.

use rayon::prelude::*;
use serde::Serialize;

use crate::distance::within_radius;
use crate::models::{Coordinates, Facility};

/// A facility together with its rounded distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyFacility {
    #[serde(flatten)]
    pub facility: Facility,
    /// Meters
    pub distance: u64,
}

/// Outcome of a proximity search.
///
/// An empty store and an empty neighbourhood are reported differently so callers
/// can tell "upload restroom data first" apart from "nothing within the radius".
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityResult {
    EmptyStore,
    NoneWithinRadius { radius_m: u64 },
    Found(Vec<NearbyFacility>),
}

impl ProximityResult {
    pub fn status(&self) -> &'static str {
        match self {
            ProximityResult::EmptyStore => "empty_store",
            ProximityResult::NoneWithinRadius { .. } => "none_within_radius",
            ProximityResult::Found(_) => "found",
        }
    }

    pub fn facilities(&self) -> &[NearbyFacility] {
        match self {
            ProximityResult::Found(found) => found,
            _ => &[],
        }
    }

    pub fn into_facilities(self) -> Vec<NearbyFacility> {
        match self {
            ProximityResult::Found(found) => found,
            _ => Vec::new(),
        }
    }
}

/// Facilities within `radius_m` of `point`, nearest first.
///
/// Equal distances keep their store order.
pub fn search(facilities: &[Facility], point: Coordinates, radius_m: u64) -> ProximityResult {
    if facilities.is_empty() {
        return ProximityResult::EmptyStore;
    }

    // Indexed collect keeps store order before the stable sort
    let mut nearby: Vec<NearbyFacility> = facilities
        .par_iter()
        .filter_map(|facility| {
            within_radius(point, facility.coordinates(), radius_m).map(|distance| {
                NearbyFacility {
                    facility: facility.clone(),
                    distance,
                }
            })
        })
        .collect();

    if nearby.is_empty() {
        return ProximityResult::NoneWithinRadius { radius_m };
    }

    nearby.sort_by_key(|n| n.distance);
    ProximityResult::Found(nearby)
}
