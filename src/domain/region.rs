//! Geographic bounding boxes for subscription filtering.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// An axis-aligned latitude/longitude rectangle.
///
/// Wire form is the source's corner-pair array:
/// `[[south_lat, west_lon], [north_lat, east_lon]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBox {
    pub south_lat: f64,
    pub west_lon: f64,
    pub north_lat: f64,
    pub east_lon: f64,
}

impl RegionBox {
    #[must_use]
    pub const fn new(south_lat: f64, west_lon: f64, north_lat: f64, east_lon: f64) -> Self {
        Self {
            south_lat,
            west_lon,
            north_lat,
            east_lon,
        }
    }

    /// Full-coverage default, used when a subscription filters by
    /// identifier only: the source mandates at least one region.
    #[must_use]
    pub const fn global() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }
}

impl Serialize for RegionBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [
            [self.south_lat, self.west_lon],
            [self.north_lat, self.east_lon],
        ]
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RegionBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let corners = <[[f64; 2]; 2]>::deserialize(deserializer)?;
        Ok(Self::new(
            corners[0][0],
            corners[0][1],
            corners[1][0],
            corners[1][1],
        ))
    }
}
