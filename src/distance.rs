//! Great-circle distance on a spherical Earth.

use crate::models::Coordinates;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in meters.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h past 1 for near-antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance rounded to the nearest whole meter.
pub fn distance_m(a: Coordinates, b: Coordinates) -> u64 {
    haversine_m(a, b).round() as u64
}

/// Rounded distance from `origin` to `target` when it is within `radius_m`.
pub fn within_radius(origin: Coordinates, target: Coordinates, radius_m: u64) -> Option<u64> {
    let distance = distance_m(origin, target);
    (distance <= radius_m).then_some(distance)
}
