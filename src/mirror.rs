//! Pull-based mirror ingestion.
//!
//! Polls a REST mirror of the position feed on a fixed interval as an
//! alternative/fallback source. A successful non-empty response replaces
//! the cache wholesale; a failed or empty poll leaves the cache untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::FixCache;
use crate::diagnostics::{RingLog, Severity};
use crate::domain::{Fix, FixCandidate, VesselId};
use crate::error::Result;

/// Default poll interval when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

/// One vessel record as served by the mirror. Field spellings are as
/// loose as the stream's, so the record tolerates the same aliases.
#[derive(Debug, Deserialize)]
struct MirrorRecord {
    #[serde(default, alias = "Latitude", alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "Longitude", alias = "lon", alias = "lng")]
    longitude: Option<f64>,
    #[serde(
        default,
        rename = "speedOverGroundKnots",
        alias = "speedOverGround",
        alias = "sog",
        alias = "Sog"
    )]
    speed_over_ground_knots: Option<f64>,
    #[serde(
        default,
        rename = "navigationalStatus",
        alias = "navStatus",
        alias = "status"
    )]
    navigational_status: Option<i32>,
    #[serde(
        default,
        rename = "observedAt",
        alias = "observed_at",
        alias = "timestamp"
    )]
    observed_at: Option<DateTime<Utc>>,
}

/// Periodic poller that mirrors the whole feed snapshot into the cache.
pub struct MirrorPoller {
    url: String,
    interval: Duration,
    client: Client,
    cache: Arc<FixCache>,
    log: Arc<RingLog>,
}

impl MirrorPoller {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        cache: Arc<FixCache>,
        log: Arc<RingLog>,
    ) -> Self {
        Self {
            url: url.into(),
            interval,
            client: Client::new(),
            cache,
            log,
        }
    }

    /// Poll forever. The first poll happens immediately, matching the
    /// warm-up fetch of the original service.
    pub async fn run(self) {
        info!(url = %self.url, interval_secs = self.interval.as_secs(), "mirror poller started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(applied) => debug!(applied, "mirror poll complete"),
                Err(e) => {
                    self.log
                        .append(Severity::Error, format!("mirror poll failed: {e}"));
                    warn!(error = %e, "mirror poll failed");
                }
            }
        }
    }

    /// Fetch the mirror once. Returns the number of fixes applied; zero
    /// means the cache was left untouched.
    pub async fn poll_once(&self) -> Result<usize> {
        let response = self
            .client
            .get(self.url.as_str())
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        let records: HashMap<String, MirrorRecord> = response.json().await?;
        let fixes = records_to_fixes(records, Utc::now());

        if fixes.is_empty() {
            self.log
                .append(Severity::Warning, "mirror returned no data, keeping previous cache");
            return Ok(0);
        }

        let applied = fixes.len();
        self.cache.replace_all(fixes);
        self.log
            .append(Severity::Info, format!("mirror refresh applied: {applied} vessel(s)"));
        Ok(applied)
    }
}

/// Convert mirror records into cacheable fixes, dropping records that
/// carry none of {latitude, longitude, speed}.
fn records_to_fixes(
    records: HashMap<String, MirrorRecord>,
    received_at: DateTime<Utc>,
) -> HashMap<VesselId, Fix> {
    records
        .into_iter()
        .filter_map(|(id, record)| {
            let candidate = FixCandidate {
                latitude: record.latitude,
                longitude: record.longitude,
                speed_over_ground_knots: record.speed_over_ground_knots,
                navigational_status: record.navigational_status,
            };
            if candidate.is_vacuous() {
                return None;
            }
            let vessel_id = VesselId::from(id);
            let observed_at = record.observed_at.unwrap_or(received_at);
            Some((vessel_id.clone(), candidate.into_fix(vessel_id, observed_at)))
        })
        .collect()
}
