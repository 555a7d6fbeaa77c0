//! Inbound frame decoding.
//!
//! The source wraps every report in a metadata/message envelope, but the
//! report bodies are not uniformly shaped: the same logical field shows up
//! under several spellings depending on message kind and feed vintage.
//! Extraction therefore walks an ordered alias table per logical field and
//! takes the first spelling present.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{FixCandidate, VesselId};

/// Known spellings per logical field, most common first.
const VESSEL_ID_ALIASES: &[&str] = &["MMSI", "mmsi", "UserID", "userId"];
const TIME_ALIASES: &[&str] = &["time_utc", "TimeUtc", "timestamp", "Timestamp", "msgtime"];
const LATITUDE_ALIASES: &[&str] = &["Latitude", "latitude", "Lat", "lat"];
const LONGITUDE_ALIASES: &[&str] = &["Longitude", "longitude", "Lon", "lon", "Lng"];
const SPEED_ALIASES: &[&str] = &[
    "Sog",
    "SOG",
    "sog",
    "SpeedOverGround",
    "speedOverGround",
    "Speed",
    "speed",
];
const STATUS_ALIASES: &[&str] = &[
    "NavigationalStatus",
    "navigationalStatus",
    "NavStatus",
    "Status",
    "status",
];

/// A frame that failed structured decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame carries no vessel identifier")]
    MissingVesselId,
}

/// One successfully decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// An application-level error object from the source. Distinct from a
    /// transport failure: the session stays open.
    SourceError(String),
    /// A vessel report.
    Report(VesselReport),
}

/// The useful content of one report frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselReport {
    pub vessel_id: VesselId,
    /// Source-reported time, when present and parseable.
    pub observed_at: Option<DateTime<Utc>>,
    pub candidate: FixCandidate,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(alias = "Error")]
    error: Option<Value>,
    #[serde(default, rename = "MetaData", alias = "Metadata", alias = "metadata")]
    meta: Option<Value>,
    #[serde(default, rename = "Message", alias = "message")]
    message: Option<Value>,
    #[serde(default, rename = "MessageType", alias = "messageType")]
    message_type: Option<String>,
}

/// Decode one inbound text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    if let Some(error) = envelope.error {
        let rendered = match error {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Ok(InboundFrame::SourceError(rendered));
    }

    let meta = envelope.meta.unwrap_or(Value::Null);
    let vessel_id = identifier_field(&meta, VESSEL_ID_ALIASES)
        .map(VesselId::new)
        .ok_or(DecodeError::MissingVesselId)?;

    let observed_at = field(&meta, TIME_ALIASES)
        .and_then(Value::as_str)
        .and_then(parse_source_time);

    let message = envelope.message.unwrap_or(Value::Null);
    let report = report_body(&message, envelope.message_type.as_deref());

    let candidate = FixCandidate {
        latitude: float_field(report, LATITUDE_ALIASES),
        longitude: float_field(report, LONGITUDE_ALIASES),
        speed_over_ground_knots: float_field(report, SPEED_ALIASES),
        navigational_status: int_field(report, STATUS_ALIASES),
    };

    Ok(InboundFrame::Report(VesselReport {
        vessel_id,
        observed_at,
        candidate,
    }))
}

/// Locate the report object inside the message envelope.
///
/// Reports usually sit one level down under their kind
/// (`{"PositionReport": {...}}`); some feeds inline the fields directly.
fn report_body<'a>(message: &'a Value, declared_kind: Option<&str>) -> &'a Value {
    let Some(map) = message.as_object() else {
        return message;
    };
    if let Some(kind) = declared_kind {
        if let Some(inner) = map.get(kind).filter(|v| v.is_object()) {
            return inner;
        }
    }
    let mut nested = map.values().filter(|v| v.is_object());
    match (nested.next(), nested.next()) {
        (Some(inner), None) => inner,
        _ => message,
    }
}

fn field<'a>(obj: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    aliases.iter().find_map(|key| map.get(*key))
}

fn float_field(obj: &Value, aliases: &[&str]) -> Option<f64> {
    field(obj, aliases).and_then(Value::as_f64)
}

fn int_field(obj: &Value, aliases: &[&str]) -> Option<i32> {
    field(obj, aliases)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}

/// Identifiers arrive as strings or integers; canonicalize to text.
fn identifier_field(obj: &Value, aliases: &[&str]) -> Option<String> {
    match field(obj, aliases)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => n
            .as_i64()
            .map(|v| v.to_string())
            .or_else(|| n.as_u64().map(|v| v.to_string())),
        _ => None,
    }
}

/// Parse the source's timestamp renderings: RFC 3339 first, then the
/// upstream's Go-style `2024-01-01 00:00:00.000000000 +0000 UTC` form.
fn parse_source_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f %z UTC")
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
