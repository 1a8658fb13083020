//! placemap - saved-place ingestion with nearby public restroom lookup.
//!
//! This library provides shared types and modules for the server and ingest binaries.

pub mod config;
pub mod distance;
pub mod error;
pub mod extract;
pub mod geocode;
pub mod models;
pub mod proximity;
pub mod region;
pub mod store;

pub use error::{Error, Result};
pub use models::{Coordinates, Facility, Place};
pub use region::Region;
