//! Vesselwatch - live vessel position tracking.
//!
//! Ingests a continuous feed of AIS position reports over a streaming
//! WebSocket subscription, keeps the most recent known fix per vessel in
//! memory, and exposes that cache for read-only polling over HTTP.
//!
//! # Architecture
//!
//! - [`stream`] - Connection lifecycle for the streaming source: the
//!   connect -> subscribe -> stream -> reconnect state machine,
//!   subscription specs, and tolerant frame decoding
//! - [`cache`] - Concurrent last-known-fix store
//! - [`diagnostics`] - Fixed-capacity ring log of lifecycle/error events
//! - [`mirror`] - Optional pull-based fallback that polls a REST mirror
//!   of the same data
//! - [`api`] - Read-only HTTP surface plus the resubscribe command
//! - [`config`] - TOML configuration with environment credential loading
//! - [`app`] - Composition root
//!
//! Filters (vessel identifiers, geographic bounding boxes, message kinds)
//! are adjustable at runtime through resubscription; the process never
//! needs a restart to change what it watches.
//!
//! # Example
//!
//! ```no_run
//! use vesselwatch::app::App;
//! use vesselwatch::config::Config;
//!
//! # async fn run() -> vesselwatch::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! App::run(config).await
//! # }
//! ```

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod mirror;
pub mod stream;
