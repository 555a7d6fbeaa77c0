//! Subscription specs and the pure builder that produces them.
//!
//! A [`SubscriptionSpec`] is the single frame sent to the source at the
//! start of every session. It is immutable once built; changing filters
//! always means building a fresh spec and resubscribing.

use serde::{Deserialize, Serialize};

use crate::domain::{RegionBox, VesselId};

/// The wire-level subscription payload: credential plus filters.
///
/// Serializes directly to the source's subscription frame. Vessel
/// identifiers are always carried as JSON strings; the source is
/// documented to silently deliver nothing for integer-typed filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionSpec {
    #[serde(rename = "APIKey")]
    credential: String,
    #[serde(rename = "BoundingBoxes")]
    region_filter: Vec<RegionBox>,
    #[serde(rename = "FiltersShipMMSI", skip_serializing_if = "Vec::is_empty")]
    vessel_filter: Vec<VesselId>,
    #[serde(rename = "FilterMessageTypes", skip_serializing_if = "Vec::is_empty")]
    message_type_filter: Vec<String>,
}

impl SubscriptionSpec {
    /// Vessel identifiers this spec restricts to; empty means no
    /// identifier restriction.
    #[must_use]
    pub fn vessel_filter(&self) -> &[VesselId] {
        &self.vessel_filter
    }

    #[must_use]
    pub fn region_filter(&self) -> &[RegionBox] {
        &self.region_filter
    }

    #[must_use]
    pub fn message_type_filter(&self) -> &[String] {
        &self.message_type_filter
    }

    /// Whether a report for `vessel_id` passes the identifier filter.
    #[must_use]
    pub fn matches_vessel(&self, vessel_id: &VesselId) -> bool {
        self.vessel_filter.is_empty() || self.vessel_filter.contains(vessel_id)
    }

    /// Credential-free view of the active filters for status surfaces.
    #[must_use]
    pub fn filters(&self) -> FilterSummary {
        FilterSummary {
            vessels: self.vessel_filter.clone(),
            regions: self.region_filter.clone(),
            message_types: self.message_type_filter.clone(),
        }
    }
}

/// Pure builder turning a filter request into a [`SubscriptionSpec`].
///
/// Each call to [`build`](Self::build) yields a fresh immutable value;
/// previously issued specs are never mutated.
#[derive(Debug, Clone, Default)]
pub struct SpecBuilder {
    identifiers: Vec<VesselId>,
    regions: Vec<RegionBox>,
    message_types: Vec<String>,
}

impl SpecBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given vessels. Duplicates are dropped, order kept.
    #[must_use]
    pub fn vessels(mut self, ids: impl IntoIterator<Item = VesselId>) -> Self {
        for id in ids {
            if !self.identifiers.contains(&id) {
                self.identifiers.push(id);
            }
        }
        self
    }

    /// Restrict to the given regions.
    #[must_use]
    pub fn regions(mut self, boxes: impl IntoIterator<Item = RegionBox>) -> Self {
        self.regions.extend(boxes);
        self
    }

    /// Restrict to the given message kinds.
    #[must_use]
    pub fn message_types(mut self, kinds: impl IntoIterator<Item = String>) -> Self {
        self.message_types.extend(kinds);
        self
    }

    /// Build the spec. The source mandates at least one region, so an
    /// identifier-only (or unfiltered) request gets the full-coverage box.
    #[must_use]
    pub fn build(self, credential: impl Into<String>) -> SubscriptionSpec {
        let region_filter = if self.regions.is_empty() {
            vec![RegionBox::global()]
        } else {
            self.regions
        };
        SubscriptionSpec {
            credential: credential.into(),
            region_filter,
            vessel_filter: self.identifiers,
            message_type_filter: self.message_types,
        }
    }
}

/// A runtime filter-change request, as accepted by the resubscribe
/// command. Identifiers may arrive as strings or integers; both
/// canonicalize to text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    #[serde(default, alias = "mmsi", alias = "vessels")]
    pub identifiers: Vec<VesselId>,
    #[serde(default, alias = "boxes")]
    pub regions: Vec<RegionBox>,
    #[serde(default, alias = "message_types")]
    pub message_types: Vec<String>,
}

impl FilterRequest {
    /// Run the request through the builder with the given credential.
    #[must_use]
    pub fn into_spec(self, credential: &str) -> SubscriptionSpec {
        SpecBuilder::new()
            .vessels(self.identifiers)
            .regions(self.regions)
            .message_types(self.message_types)
            .build(credential)
    }
}

/// Credential-free filter view, for diagnostics and command responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSummary {
    pub vessels: Vec<VesselId>,
    pub regions: Vec<RegionBox>,
    pub message_types: Vec<String>,
}
