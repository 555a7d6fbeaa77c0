//! Application wiring.
//!
//! Composes the cache, ring log, connection manager, optional mirror
//! poller and the HTTP read surface, then serves until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::{self, ApiContext};
use crate::cache::FixCache;
use crate::config::Config;
use crate::diagnostics::RingLog;
use crate::error::Result;
use crate::mirror::MirrorPoller;
use crate::stream::StreamManager;

/// Main application struct.
pub struct App;

impl App {
    /// Run the full service: start streaming ingestion, the mirror poller
    /// when configured, and serve the read surface.
    pub async fn run(config: Config) -> Result<()> {
        let cache = Arc::new(FixCache::new());
        let log = Arc::new(RingLog::new(config.diagnostics.log_capacity));

        let manager = Arc::new(StreamManager::new(
            config.stream_config(),
            cache.clone(),
            log.clone(),
        ));
        manager.start(config.initial_spec());

        if let Some(mirror_url) = config.mirror.url.clone() {
            let poller = MirrorPoller::new(
                mirror_url,
                Duration::from_secs(config.mirror.poll_interval_secs),
                cache.clone(),
                log.clone(),
            );
            tokio::spawn(poller.run());
        }

        let router = api::router(ApiContext {
            cache,
            log,
            manager,
        });
        let listener = tokio::net::TcpListener::bind(&config.http.bind_addr).await?;
        info!(addr = %config.http.bind_addr, "read surface listening");

        axum::serve(listener, router).await?;
        Ok(())
    }
}
