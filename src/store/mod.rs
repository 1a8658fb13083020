//! JSON document stores for places and facilities.

pub mod blob;
pub mod facilities;
pub mod places;

pub use blob::JsonBlobStore;
pub use facilities::{FacilityStore, IngestSummary};
pub use places::PlaceStore;
