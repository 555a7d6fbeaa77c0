//! Source-agnostic domain types.

mod fix;
mod region;

pub use fix::{Fix, FixCandidate, VesselId};
pub use region::RegionBox;
