//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with the stream credential
//! taken from the `AIS_API_KEY` environment variable (never from the file).
//! A missing file falls back to defaults, so a credential alone is enough
//! to run.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use crate::diagnostics::DEFAULT_LOG_CAPACITY;
use crate::domain::{RegionBox, VesselId};
use crate::error::{ConfigError, Result};
use crate::mirror::DEFAULT_POLL_INTERVAL;
use crate::stream::{SpecBuilder, StreamConfig, SubscriptionSpec};

/// Environment variable holding the streaming credential.
pub const CREDENTIAL_ENV_VAR: &str = "AIS_API_KEY";

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamSourceConfig,
    pub subscription: SubscriptionConfig,
    pub mirror: MirrorConfig,
    pub http: HttpConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

/// Streaming source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSourceConfig {
    pub url: String,
    /// Loaded from [`CREDENTIAL_ENV_VAR`]; never read from the file.
    #[serde(skip)]
    pub credential: String,
    pub reconnect_delay_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub clear_cache_on_resubscribe: bool,
}

impl Default for StreamSourceConfig {
    fn default() -> Self {
        Self {
            url: "wss://stream.aisstream.io/v0/stream".into(),
            credential: String::new(),
            reconnect_delay_secs: 5,
            heartbeat_interval_secs: 25,
            clear_cache_on_resubscribe: false,
        }
    }
}

/// Default subscription filters applied at start-up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub identifiers: Vec<String>,
    pub regions: Vec<RegionBox>,
    pub message_types: Vec<String>,
}

/// REST mirror fallback; disabled unless a URL is configured.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub url: Option<String>,
    pub poll_interval_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            url: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

/// Read-surface listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

/// Diagnostics surface settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Ring log capacity; the useful range is roughly 50-120 entries.
    pub log_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist, then overlay the credential from the
    /// environment and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config: Self = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        } else {
            Self::default()
        };

        config.stream.credential = std::env::var(CREDENTIAL_ENV_VAR).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stream.credential.is_empty() {
            return Err(ConfigError::MissingField {
                field: CREDENTIAL_ENV_VAR,
            }
            .into());
        }

        let url = Url::parse(&self.stream.url).map_err(|e| ConfigError::InvalidValue {
            field: "stream.url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "stream.url",
                reason: format!("expected ws:// or wss:// scheme, got {}", url.scheme()),
            }
            .into());
        }

        if let Some(mirror_url) = &self.mirror.url {
            let parsed = Url::parse(mirror_url).map_err(|e| ConfigError::InvalidValue {
                field: "mirror.url",
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidValue {
                    field: "mirror.url",
                    reason: format!("expected http:// or https:// scheme, got {}", parsed.scheme()),
                }
                .into());
            }
            if self.mirror.poll_interval_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "mirror.poll_interval_secs",
                    reason: "must be at least 1 second".into(),
                }
                .into());
            }
        }

        if self.stream.reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stream.reconnect_delay_secs",
                reason: "must be at least 1 second".into(),
            }
            .into());
        }
        if self.diagnostics.log_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "diagnostics.log_capacity",
                reason: "must hold at least one entry".into(),
            }
            .into());
        }

        Ok(())
    }

    /// Connection-manager settings derived from this config.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.stream.url.clone(),
            credential: self.stream.credential.clone(),
            reconnect_delay: Duration::from_secs(self.stream.reconnect_delay_secs),
            heartbeat_interval: Duration::from_secs(self.stream.heartbeat_interval_secs),
            clear_cache_on_resubscribe: self.stream.clear_cache_on_resubscribe,
        }
    }

    /// The subscription spec used for the very first session.
    #[must_use]
    pub fn initial_spec(&self) -> SubscriptionSpec {
        SpecBuilder::new()
            .vessels(self.subscription.identifiers.iter().cloned().map(VesselId::from))
            .regions(self.subscription.regions.iter().copied())
            .message_types(self.subscription.message_types.iter().cloned())
            .build(self.stream.credential.as_str())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credential(mut config: Config) -> Config {
        config.stream.credential = "test-key".into();
        config
    }

    #[test]
    fn test_defaults_validate_with_credential() {
        let config = with_credential(Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.reconnect_delay_secs, 5);
        assert_eq!(config.stream.heartbeat_interval_secs, 25);
        assert_eq!(config.diagnostics.log_capacity, DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn test_missing_credential_rejected() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml_sections() {
        let config: Config = toml::from_str(
            r#"
            [stream]
            url = "wss://example.net/stream"
            reconnect_delay_secs = 2

            [subscription]
            identifiers = ["244944000"]
            regions = [[[54.0, 10.0], [60.0, 20.0]]]

            [mirror]
            url = "https://mirror.example.net/positions"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        let config = with_credential(config);

        assert!(config.validate().is_ok());
        assert_eq!(config.stream.url, "wss://example.net/stream");
        assert_eq!(config.stream.reconnect_delay_secs, 2);
        assert_eq!(config.subscription.identifiers, ["244944000"]);
        assert_eq!(config.subscription.regions.len(), 1);
        assert_eq!(config.mirror.url.as_deref(), Some("https://mirror.example.net/positions"));
        assert_eq!(config.mirror.poll_interval_secs, 120);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_non_websocket_scheme_rejected() {
        let mut config = with_credential(Config::default());
        config.stream.url = "https://example.net/stream".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_spec_uses_configured_filters() {
        let mut config = with_credential(Config::default());
        config.subscription.identifiers = vec!["244944000".into()];

        let spec = config.initial_spec();
        assert_eq!(spec.vessel_filter(), &[VesselId::from("244944000")]);
        // Identifier-only filtering still gets a region.
        assert_eq!(spec.region_filter().len(), 1);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        std::env::set_var(CREDENTIAL_ENV_VAR, "test-key");
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.stream.url, "wss://stream.aisstream.io/v0/stream");
        assert_eq!(config.stream.credential, "test-key");
        std::env::remove_var(CREDENTIAL_ENV_VAR);
    }
}
