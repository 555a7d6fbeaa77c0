//! Read-only HTTP surface.
//!
//! Serves the fix cache, diagnostics and the resubscribe command. Every
//! response carries a permissive CORS header: the original deployment
//! serves a separately-hosted frontend.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::FixCache;
use crate::diagnostics::{LogEntry, RingLog};
use crate::domain::{Fix, VesselId};
use crate::stream::{FilterRequest, FilterSummary, StatusSnapshot, StreamManager};

/// Shared handles the handlers read from.
#[derive(Clone)]
pub struct ApiContext {
    pub cache: Arc<FixCache>,
    pub log: Arc<RingLog>,
    pub manager: Arc<StreamManager>,
}

/// Build the read-surface router.
pub fn router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/positions", get(positions))
        .route("/status", get(status))
        .route("/raw", get(raw))
        .route("/logs", get(logs))
        .route("/resubscribe", post(resubscribe))
        .with_state(ctx)
}

fn json_response(body: impl Serialize) -> Response {
    ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(body)).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexResponse {
    ok: bool,
    cache_size: usize,
    last_message_at: Option<DateTime<Utc>>,
}

async fn index(State(ctx): State<ApiContext>) -> Response {
    json_response(IndexResponse {
        ok: true,
        cache_size: ctx.cache.len(),
        last_message_at: ctx.manager.status().last_message_at(),
    })
}

#[derive(Deserialize)]
struct PositionsQuery {
    /// Comma-separated identifier list; absent means everything cached.
    ids: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionsResponse {
    last_updated: Option<DateTime<Utc>>,
    /// Every requested identifier appears here, `null` for unseen ones.
    positions: BTreeMap<VesselId, Option<Fix>>,
}

fn parse_ids(raw: &str) -> Vec<VesselId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(VesselId::from)
        .collect()
}

async fn positions(
    State(ctx): State<ApiContext>,
    Query(query): Query<PositionsQuery>,
) -> Response {
    let positions = match query.ids.as_deref() {
        Some(raw) => ctx.cache.get_many(&parse_ids(raw)),
        None => ctx
            .cache
            .snapshot()
            .into_iter()
            .map(|(id, fix)| (id, Some(fix)))
            .collect(),
    };

    json_response(PositionsResponse {
        last_updated: ctx.manager.status().last_message_at(),
        positions,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    stream: StatusSnapshot,
    cache_size: usize,
    known_vessels: Vec<VesselId>,
}

async fn status(State(ctx): State<ApiContext>) -> Response {
    json_response(StatusResponse {
        stream: ctx.manager.status().snapshot(),
        cache_size: ctx.cache.len(),
        known_vessels: ctx.cache.known_ids(),
    })
}

#[derive(Serialize)]
struct RawResponse {
    raw: Option<String>,
}

async fn raw(State(ctx): State<ApiContext>) -> Response {
    json_response(RawResponse {
        raw: ctx.manager.status().last_raw_payload(),
    })
}

#[derive(Serialize)]
struct LogsResponse {
    entries: Vec<LogEntry>,
}

async fn logs(State(ctx): State<ApiContext>) -> Response {
    json_response(LogsResponse {
        entries: ctx.log.snapshot(),
    })
}

#[derive(Serialize)]
struct ResubscribeResponse {
    accepted: bool,
    filters: FilterSummary,
}

async fn resubscribe(
    State(ctx): State<ApiContext>,
    Json(request): Json<FilterRequest>,
) -> Response {
    let filters = ctx.manager.resubscribe(request);
    json_response(ResubscribeResponse {
        accepted: true,
        filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        let ids = parse_ids("244944000, 258012345,,  ");
        assert_eq!(
            ids,
            vec![VesselId::from("244944000"), VesselId::from("258012345")]
        );
    }

    #[test]
    fn test_parse_ids_empty() {
        assert!(parse_ids("").is_empty());
        assert!(parse_ids(" , ").is_empty());
    }
}
