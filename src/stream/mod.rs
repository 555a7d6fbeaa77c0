//! Streaming ingestion: connection lifecycle, subscription specs, and
//! inbound frame decoding.

mod manager;
mod messages;
mod spec;
mod status;

pub use manager::{StreamConfig, StreamManager};
pub use messages::{decode_frame, DecodeError, InboundFrame, VesselReport};
pub use spec::{FilterRequest, FilterSummary, SpecBuilder, SubscriptionSpec};
pub use status::{ConnectionState, StatusSnapshot, StreamStatus};
