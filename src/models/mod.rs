//! Core data models for places and facilities.

pub mod facility;
pub mod place;

pub use facility::{Facility, FacilitySnapshot};
pub use place::{Coordinates, Place, PlaceSnapshot, UNNAMED_PLACE};
