//! Stream connection manager.
//!
//! Maintains exactly one logical streaming session at a time and drives the
//! connect -> subscribe -> stream -> reconnect state machine for the
//! process lifetime. The whole session lives inside one spawned task:
//! aborting the task is the cancellation story for the heartbeat and any
//! pending reconnect delay, so timers cannot leak across resubscribes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

use crate::cache::FixCache;
use crate::diagnostics::{RingLog, Severity};

use super::messages::{decode_frame, InboundFrame};
use super::spec::{FilterRequest, FilterSummary, SubscriptionSpec};
use super::status::{ConnectionState, StreamStatus};

/// Connection-manager settings, resolved from the application config.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Streaming endpoint, `wss://...`.
    pub url: String,
    /// Static credential carried in every subscription frame.
    pub credential: String,
    /// Fixed delay before every reconnect attempt. No backoff, no cap:
    /// reconnection is unconditional and indefinite.
    pub reconnect_delay: Duration,
    /// Keep-alive ping interval for the lifetime of a session.
    pub heartbeat_interval: Duration,
    /// Whether a resubscribe drops previously cached fixes.
    pub clear_cache_on_resubscribe: bool,
}

/// Owns the streaming session and its shared side effects: fix cache
/// updates, ring log appends, and status fields.
pub struct StreamManager {
    config: StreamConfig,
    cache: Arc<FixCache>,
    log: Arc<RingLog>,
    status: Arc<StreamStatus>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl StreamManager {
    #[must_use]
    pub fn new(config: StreamConfig, cache: Arc<FixCache>, log: Arc<RingLog>) -> Self {
        Self {
            config,
            cache,
            log,
            status: Arc::new(StreamStatus::new()),
            session: Mutex::new(None),
        }
    }

    /// Shared status handle for read surfaces.
    #[must_use]
    pub fn status(&self) -> Arc<StreamStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Begin streaming with `initial_spec`. At most one live session per
    /// manager: calling this twice is a logged no-op.
    pub fn start(&self, initial_spec: SubscriptionSpec) {
        let mut session = self.session.lock();
        if session.is_some() {
            warn!("stream session already running, ignoring start");
            return;
        }
        self.status.set_active_spec(initial_spec.clone());
        *session = Some(self.spawn_session(initial_spec));
    }

    /// Tear down the current session (whatever state it is in) and start a
    /// fresh one with the filters in `request`.
    ///
    /// Returns the accepted filter set. Acceptance means the new spec is
    /// active, not that the new session is live yet.
    pub fn resubscribe(&self, request: FilterRequest) -> FilterSummary {
        let spec = request.into_spec(&self.config.credential);
        let summary = spec.filters();

        let mut session = self.session.lock();
        if let Some(handle) = session.take() {
            handle.abort();
        }

        self.status.reset_counters();
        self.status.set_active_spec(spec.clone());
        if self.config.clear_cache_on_resubscribe {
            self.cache.clear();
        }

        self.log.append(
            Severity::Info,
            format!(
                "resubscribing: {} vessel(s), {} region(s), {} message kind(s)",
                summary.vessels.len(),
                summary.regions.len(),
                summary.message_types.len()
            ),
        );
        info!(
            vessels = summary.vessels.len(),
            regions = summary.regions.len(),
            "resubscribing with new filter set"
        );

        *session = Some(self.spawn_session(spec));
        summary
    }

    fn spawn_session(&self, spec: SubscriptionSpec) -> JoinHandle<()> {
        let ctx = SessionContext {
            config: self.config.clone(),
            cache: self.cache.clone(),
            log: self.log.clone(),
            status: self.status.clone(),
        };
        tokio::spawn(session_loop(ctx, spec))
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        if let Some(handle) = self.session.lock().take() {
            handle.abort();
        }
    }
}

/// Everything one session task needs, cloned out of the manager so the
/// task owns its state outright.
struct SessionContext {
    config: StreamConfig,
    cache: Arc<FixCache>,
    log: Arc<RingLog>,
    status: Arc<StreamStatus>,
}

/// Reconnect loop: every exit from a session, clean or not, schedules the
/// next attempt with the SAME spec after the fixed delay.
async fn session_loop(ctx: SessionContext, spec: SubscriptionSpec) {
    loop {
        let _ = run_session(&ctx, &spec).await;

        ctx.status.set_state(ConnectionState::Reconnecting);
        debug!(
            delay_ms = ctx.config.reconnect_delay.as_millis() as u64,
            "scheduling reconnect"
        );
        sleep(ctx.config.reconnect_delay).await;
    }
}

/// One connected lifetime of the transport: connect, send the subscription
/// frame, then pump frames until close or error.
async fn run_session(
    ctx: &SessionContext,
    spec: &SubscriptionSpec,
) -> Result<(), crate::error::Error> {
    ctx.status.set_state(ConnectionState::Connecting);
    info!(url = %ctx.config.url, "connecting to stream");

    let (ws, response) = match connect_async(&ctx.config.url).await {
        Ok(ok) => ok,
        Err(e) => {
            ctx.log
                .append(Severity::Error, format!("connect failed: {e}"));
            error!(error = %e, "connect failed");
            return Err(e.into());
        }
    };
    info!(status = %response.status(), "stream connected");

    ctx.status.set_state(ConnectionState::Subscribing);
    let frame = serde_json::to_string(spec)?;

    let (mut write, mut read) = ws.split();
    if let Err(e) = write.send(Message::Text(frame)).await {
        ctx.log
            .append(Severity::Error, format!("subscribe failed: {e}"));
        error!(error = %e, "failed to send subscription frame");
        return Err(e.into());
    }
    info!(
        vessels = spec.vessel_filter().len(),
        regions = spec.region_filter().len(),
        "subscription frame sent"
    );
    ctx.status.set_state(ConnectionState::Streaming);

    let mut heartbeat = interval_at(
        Instant::now() + ctx.config.heartbeat_interval,
        ctx.config.heartbeat_interval,
    );

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    apply_frame(&ctx.cache, &ctx.log, &ctx.status, spec, &text);
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!(" ({})", f.reason))
                        .unwrap_or_default();
                    ctx.log
                        .append(Severity::Error, format!("stream closed by peer{reason}"));
                    warn!("stream closed by peer");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // A transport error forces the close path immediately.
                    ctx.log
                        .append(Severity::Error, format!("stream transport error: {e}"));
                    error!(error = %e, "stream transport error");
                    return Err(e.into());
                }
                None => {
                    ctx.log
                        .append(Severity::Error, "stream ended unexpectedly".to_string());
                    warn!("stream ended unexpectedly");
                    return Ok(());
                }
            },
            _ = heartbeat.tick() => {
                // Best effort: a failed ping never tears the session down by
                // itself; a dead socket surfaces through the read side.
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    debug!(error = %e, "heartbeat ping failed");
                }
            }
        }
    }
}

/// Process one inbound text frame: record it, decode it, and apply it to
/// the cache when it qualifies. Frame-level failures never touch the
/// session; the next frame decodes on its own merits.
pub(crate) fn apply_frame(
    cache: &FixCache,
    log: &RingLog,
    status: &StreamStatus,
    spec: &SubscriptionSpec,
    text: &str,
) {
    let received_at = status.record_frame(text);

    match decode_frame(text) {
        Err(e) => {
            log.append(Severity::Error, format!("undecodable frame: {e}"));
            warn!(error = %e, "undecodable frame");
        }
        Ok(InboundFrame::SourceError(message)) => {
            log.append(Severity::Error, format!("source error: {message}"));
            warn!(%message, "source reported an error");
        }
        Ok(InboundFrame::Report(report)) => {
            if !spec.matches_vessel(&report.vessel_id) {
                return;
            }
            let observed_at = report.observed_at.unwrap_or(received_at);
            if cache.update(report.vessel_id.clone(), report.candidate, observed_at) {
                trace!(vessel = %report.vessel_id, "fix updated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VesselId;
    use crate::stream::spec::SpecBuilder;

    fn fixtures() -> (FixCache, RingLog, StreamStatus) {
        (FixCache::new(), RingLog::new(16), StreamStatus::new())
    }

    #[test]
    fn test_apply_frame_end_to_end() {
        let (cache, log, status) = fixtures();
        let spec = SpecBuilder::new().build("key");

        apply_frame(
            &cache,
            &log,
            &status,
            &spec,
            r#"{"MetaData":{"MMSI":"244944000","time_utc":"2024-01-01T00:00:00Z"},
               "Message":{"PositionReport":{"Latitude":59.3,"Longitude":18.0,"Sog":12.5}}}"#,
        );

        let fix = cache.get(&VesselId::from("244944000")).unwrap();
        assert_eq!(fix.latitude, Some(59.3));
        assert_eq!(fix.longitude, Some(18.0));
        assert_eq!(fix.speed_over_ground_knots, Some(12.5));
        assert_eq!(fix.navigational_status, None);
        let expected: chrono::DateTime<chrono::Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(fix.observed_at, expected);
        assert_eq!(status.message_count(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_filtered_vessel_discarded_but_counted() {
        let (cache, log, status) = fixtures();
        let spec = SpecBuilder::new()
            .vessels([VesselId::from("111111111")])
            .build("key");

        apply_frame(
            &cache,
            &log,
            &status,
            &spec,
            r#"{"MetaData":{"MMSI":"244944000"},"Message":{"PositionReport":{"Latitude":1.0}}}"#,
        );

        assert!(cache.is_empty());
        assert_eq!(status.message_count(), 1);
        assert!(status.last_raw_payload().is_some());
    }

    #[test]
    fn test_decode_failure_logged_and_isolated() {
        let (cache, log, status) = fixtures();
        let spec = SpecBuilder::new().build("key");

        apply_frame(&cache, &log, &status, &spec, "garbage");
        assert_eq!(log.snapshot().len(), 1);
        assert_eq!(log.snapshot()[0].severity, Severity::Error);

        // The next well-formed frame still applies.
        apply_frame(
            &cache,
            &log,
            &status,
            &spec,
            r#"{"MetaData":{"MMSI":"1"},"Message":{"PositionReport":{"Latitude":2.0}}}"#,
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(status.message_count(), 2);
    }

    #[test]
    fn test_source_error_logged_session_state_untouched() {
        let (cache, log, status) = fixtures();
        let spec = SpecBuilder::new().build("key");

        apply_frame(&cache, &log, &status, &spec, r#"{"error":"bad api key"}"#);

        assert!(cache.is_empty());
        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.contains("bad api key"));
    }

    #[test]
    fn test_vacuous_report_discarded_silently() {
        let (cache, log, status) = fixtures();
        let spec = SpecBuilder::new().build("key");

        apply_frame(
            &cache,
            &log,
            &status,
            &spec,
            r#"{"MetaData":{"MMSI":"1"},"Message":{"ShipStaticData":{"Name":"SJARKEN"}}}"#,
        );

        assert!(cache.is_empty());
        // Expected and frequent: not an error, so not ring-logged.
        assert!(log.is_empty());
        assert_eq!(status.message_count(), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_resets_counters_and_swaps_spec() {
        let cache = Arc::new(FixCache::new());
        let log = Arc::new(RingLog::new(16));
        let manager = StreamManager::new(
            StreamConfig {
                // Nothing listens here; the session just cycles through
                // its reconnect loop in the background.
                url: "ws://127.0.0.1:9".to_string(),
                credential: "key".to_string(),
                reconnect_delay: Duration::from_secs(60),
                heartbeat_interval: Duration::from_secs(60),
                clear_cache_on_resubscribe: false,
            },
            cache.clone(),
            log.clone(),
        );

        manager.start(SpecBuilder::new().build("key"));
        assert!(manager.is_running());

        let status = manager.status();
        status.record_frame("{}");
        assert_eq!(status.message_count(), 1);

        let request: FilterRequest =
            serde_json::from_str(r#"{"identifiers":[244944000]}"#).unwrap();
        let summary = manager.resubscribe(request);

        assert_eq!(summary.vessels, vec![VesselId::from("244944000")]);
        assert_eq!(status.message_count(), 0);
        assert!(status.last_raw_payload().is_none());

        let active = status.active_spec().unwrap();
        assert_eq!(active.vessel_filter(), &[VesselId::from("244944000")]);
        assert!(manager.is_running());
    }

    #[tokio::test]
    async fn test_resubscribe_clear_cache_policy() {
        let cache = Arc::new(FixCache::new());
        let log = Arc::new(RingLog::new(16));
        let manager = StreamManager::new(
            StreamConfig {
                url: "ws://127.0.0.1:9".to_string(),
                credential: "key".to_string(),
                reconnect_delay: Duration::from_secs(60),
                heartbeat_interval: Duration::from_secs(60),
                clear_cache_on_resubscribe: true,
            },
            cache.clone(),
            log,
        );

        cache.update(
            VesselId::from("1"),
            crate::domain::FixCandidate {
                latitude: Some(1.0),
                ..Default::default()
            },
            chrono::Utc::now(),
        );
        assert_eq!(cache.len(), 1);

        manager.resubscribe(FilterRequest::default());
        assert!(cache.is_empty());
    }
}
