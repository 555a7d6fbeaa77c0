//! Vessel identifiers and last-known-fix records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Canonical vessel identifier - newtype for type safety.
///
/// Maritime identifiers are numeric on the wire but are compared and
/// transmitted as text everywhere in this crate: the upstream source
/// silently delivers nothing for integer-typed identifier filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VesselId(String);

impl VesselId {
    /// Create a new `VesselId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VesselId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for VesselId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for VesselId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Accepts both JSON strings and JSON integers, canonicalizing to text.
/// Filter requests and vendor payloads use the two interchangeably.
impl<'de> Deserialize<'de> for VesselId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = VesselId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a vessel identifier as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<VesselId, E> {
                Ok(VesselId::new(v.trim()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<VesselId, E> {
                Ok(VesselId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<VesselId, E> {
                Ok(VesselId::new(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// One vessel's last known kinematic state.
///
/// Replaced wholesale on every qualifying inbound report; never merged
/// field-by-field with a prior record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub vessel_id: VesselId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_over_ground_knots: Option<f64>,
    pub navigational_status: Option<i32>,
    /// Source-reported time of the fix, falling back to receipt time.
    pub observed_at: DateTime<Utc>,
}

/// Kinematic fields extracted from one inbound report, before the
/// usability check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixCandidate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_over_ground_knots: Option<f64>,
    pub navigational_status: Option<i32>,
}

impl FixCandidate {
    /// A candidate with no position and no speed carries nothing worth
    /// caching (source noise) and must be discarded.
    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.speed_over_ground_knots.is_none()
    }

    /// Build the full replacement record for `vessel_id`.
    #[must_use]
    pub fn into_fix(self, vessel_id: VesselId, observed_at: DateTime<Utc>) -> Fix {
        Fix {
            vessel_id,
            latitude: self.latitude,
            longitude: self.longitude,
            speed_over_ground_knots: self.speed_over_ground_knots,
            navigational_status: self.navigational_status,
            observed_at,
        }
    }
}
