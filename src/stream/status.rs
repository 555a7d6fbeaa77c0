//! Shared connection status, written by the session and read by the
//! diagnostics surface.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::spec::{FilterSummary, SubscriptionSpec};

/// Lifecycle state of the streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Transient per-session statistics. Overwritten continuously, reset on
/// resubscribe, never persisted.
pub struct StreamStatus {
    state: RwLock<ConnectionState>,
    message_count: AtomicU64,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
    last_raw_payload: RwLock<Option<String>>,
    active_spec: RwLock<Option<SubscriptionSpec>>,
}

impl StreamStatus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Idle),
            message_count: AtomicU64::new(0),
            last_message_at: RwLock::new(None),
            last_raw_payload: RwLock::new(None),
            active_spec: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Record one inbound frame and return the receipt time.
    ///
    /// Counting happens before decoding: the counter and raw-payload
    /// snapshot reflect transport traffic, whether or not the frame was
    /// ultimately applied to the cache.
    pub fn record_frame(&self, raw: &str) -> DateTime<Utc> {
        let received_at = Utc::now();
        self.message_count.fetch_add(1, Ordering::Relaxed);
        *self.last_message_at.write() = Some(received_at);
        *self.last_raw_payload.write() = Some(raw.to_string());
        received_at
    }

    /// Zero the per-session counters (resubscribe).
    pub fn reset_counters(&self) {
        self.message_count.store(0, Ordering::Relaxed);
        *self.last_message_at.write() = None;
        *self.last_raw_payload.write() = None;
    }

    pub fn set_active_spec(&self, spec: SubscriptionSpec) {
        *self.active_spec.write() = Some(spec);
    }

    #[must_use]
    pub fn active_spec(&self) -> Option<SubscriptionSpec> {
        self.active_spec.read().clone()
    }

    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        *self.last_message_at.read()
    }

    #[must_use]
    pub fn last_raw_payload(&self) -> Option<String> {
        self.last_raw_payload.read().clone()
    }

    /// Point-in-time view for the status surface. The credential never
    /// leaves this type; only the filter set is exposed.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            message_count: self.message_count(),
            last_message_at: self.last_message_at(),
            filters: self.active_spec.read().as_ref().map(SubscriptionSpec::filters),
        }
    }
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable status view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: ConnectionState,
    pub message_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub filters: Option<FilterSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::spec::SpecBuilder;

    #[test]
    fn test_record_and_reset() {
        let status = StreamStatus::new();
        assert_eq!(status.message_count(), 0);
        assert!(status.last_message_at().is_none());

        status.record_frame("{\"a\":1}");
        status.record_frame("{\"b\":2}");

        assert_eq!(status.message_count(), 2);
        assert!(status.last_message_at().is_some());
        assert_eq!(status.last_raw_payload().as_deref(), Some("{\"b\":2}"));

        status.reset_counters();
        assert_eq!(status.message_count(), 0);
        assert!(status.last_message_at().is_none());
        assert!(status.last_raw_payload().is_none());
    }

    #[test]
    fn test_snapshot_redacts_credential() {
        let status = StreamStatus::new();
        status.set_active_spec(SpecBuilder::new().build("super-secret"));

        let snapshot = status.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("regions"));
    }

    #[test]
    fn test_state_transitions() {
        let status = StreamStatus::new();
        assert_eq!(status.state(), ConnectionState::Idle);
        status.set_state(ConnectionState::Connecting);
        assert_eq!(status.state(), ConnectionState::Connecting);
        assert_eq!(status.state().to_string(), "connecting");
    }
}
