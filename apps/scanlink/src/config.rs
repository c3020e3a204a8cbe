//! # Station Configuration
//!
//! The TOML file a station is started from.
//!
//! Every section and every key is optional; a missing file yields the
//! defaults. Durations are written as integer milliseconds.
//!
//! ```toml
//! [matching]
//! window_ms = 3000
//! pending_expiry_ms = 30000
//!
//! [publish]
//! url = "http://broker.local:8080/publish"
//! topic = "studenten"
//!
//! [rfid]
//! input = "/dev/ttyUSB0"
//! byte_order = "msb_first"
//! ```
//!
//! ## Environment Overrides
//!
//! - `SCANLINK_API_KEY`: API key of the HTTP server
//! - `SCANLINK_PUBLISH_API_KEY`: bearer token sent to the publish endpoint

use scanlink_core::ScanlinkError;
use scanlink_core::primitives::{
    DEFAULT_FEEDBACK_RESET_MS, DEFAULT_IDENTIFIERS_FILE, DEFAULT_LINKS_FILE,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_TOPIC, DEFAULT_WINDOW_MS,
};
use scanlink_core::{ByteOrder, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `server.api_key`.
pub const API_KEY_ENV: &str = "SCANLINK_API_KEY";

/// Environment variable overriding `publish.api_key`.
pub const PUBLISH_API_KEY_ENV: &str = "SCANLINK_PUBLISH_API_KEY";

/// Placeholder printed instead of a secret.
const REDACTED: &str = "<redacted>";

// =============================================================================
// SECTIONS
// =============================================================================

/// Matching rules of the correlation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Maximum gap between a barcode and a card (inclusive).
    pub window_ms: u64,
    /// Age after which an unmatched reading is dropped. 0 keeps it forever.
    pub pending_expiry_ms: u64,
    /// Identical consecutive readings within this hold-off are ignored.
    /// 0 disables the filter.
    pub repeat_holdoff_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            pending_expiry_ms: 30_000,
            repeat_holdoff_ms: 2_000,
        }
    }
}

/// Locations of the dedup records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub identifiers_path: PathBuf,
    pub links_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            identifiers_path: PathBuf::from(DEFAULT_IDENTIFIERS_FILE),
            links_path: PathBuf::from(DEFAULT_LINKS_FILE),
        }
    }
}

/// Outbound publishing of identifiers and links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Endpoint receiving `{"topic", "payload"}` POSTs. Unset: log only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: None,
            topic: DEFAULT_TOPIC.to_string(),
            api_key: None,
            max_attempts: 3,
            retry_backoff_ms: 500,
            timeout_ms: 5_000,
        }
    }
}

/// Local light/sound indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackConfig {
    /// Delay before the indicator falls back to neutral.
    pub reset_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            reset_ms: DEFAULT_FEEDBACK_RESET_MS,
        }
    }
}

/// Barcode stream input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarcodeConfig {
    /// File, FIFO or `-` for stdin, one decoded payload per line.
    /// Unset: the stream is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
}

/// RFID stream input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RfidConfig {
    /// File, FIFO or `-` for stdin, one line of UID bytes per card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    pub byte_order: ByteOrder,
    pub poll_interval_ms: u64,
}

impl Default for RfidConfig {
    fn default() -> Self {
        Self {
            input: None,
            byte_order: ByteOrder::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// HTTP API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on every endpoint but `/health`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Requests per second, 0 disables the limiter.
    pub rate_limit: u32,
    /// Allowed CORS origins; `["*"]` allows any. Empty: localhost only.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            api_key: None,
            rate_limit: 100,
            cors_origins: Vec::new(),
        }
    }
}

// =============================================================================
// STATION CONFIG
// =============================================================================

/// Complete configuration of one station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    pub matching: MatchingConfig,
    pub storage: StorageConfig,
    pub publish: PublishConfig,
    pub feedback: FeedbackConfig,
    pub barcode: BarcodeConfig,
    pub rfid: RfidConfig,
    pub server: ServerConfig,
}

impl StationConfig {
    /// Load the configuration file at `path`, then apply environment
    /// overrides and validate.
    ///
    /// A missing file is not an error: the station runs on defaults.
    pub fn load(path: &Path) -> Result<Self, ScanlinkError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ScanlinkError::IoError(format!("Cannot read config {}: {}", path.display(), e))
            })?;
            toml::from_str(&content).map_err(|e| {
                ScanlinkError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document. No environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self, ScanlinkError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ScanlinkError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace API keys with the values of their environment variables,
    /// when those are set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.server.api_key = Some(key);
        }
        if let Some(key) = non_empty_env(PUBLISH_API_KEY_ENV) {
            self.publish.api_key = Some(key);
        }
    }

    /// Reject settings the station cannot run with.
    pub fn validate(&self) -> Result<(), ScanlinkError> {
        if self.matching.window_ms == 0 {
            return Err(ScanlinkError::Config(
                "matching.window_ms must be greater than 0".to_string(),
            ));
        }
        if self.rfid.poll_interval_ms == 0 {
            return Err(ScanlinkError::Config(
                "rfid.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.publish.max_attempts == 0 {
            return Err(ScanlinkError::Config(
                "publish.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.publish.topic.trim().is_empty() {
            return Err(ScanlinkError::Config(
                "publish.topic must not be empty".to_string(),
            ));
        }
        if self.storage.identifiers_path.as_os_str().is_empty()
            || self.storage.links_path.as_os_str().is_empty()
        {
            return Err(ScanlinkError::Config(
                "storage paths must not be empty".to_string(),
            ));
        }
        if self.storage.identifiers_path == self.storage.links_path {
            return Err(ScanlinkError::Config(
                "storage.identifiers_path and storage.links_path must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine parameters derived from `[matching]` and `[publish]`.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            window: Duration::from_millis(self.matching.window_ms),
            pending_expiry: (self.matching.pending_expiry_ms > 0)
                .then(|| Duration::from_millis(self.matching.pending_expiry_ms)),
            topic: self.publish.topic.clone(),
        }
    }

    /// Hold-off of the repeat filter on both streams.
    #[must_use]
    pub fn repeat_holdoff(&self) -> Duration {
        Duration::from_millis(self.matching.repeat_holdoff_ms)
    }

    /// Delay before the indicator resets to neutral.
    #[must_use]
    pub fn feedback_reset(&self) -> Duration {
        Duration::from_millis(self.feedback.reset_ms)
    }

    /// Cadence of the RFID poll loop.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rfid.poll_interval_ms)
    }

    /// `host:port` the API server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// A copy safe to print: secrets are replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.server.api_key.is_some() {
            copy.server.api_key = Some(REDACTED.to_string());
        }
        if copy.publish.api_key.is_some() {
            copy.publish.api_key = Some(REDACTED.to_string());
        }
        copy
    }

    /// Render as a TOML document.
    pub fn to_toml(&self) -> Result<String, ScanlinkError> {
        toml::to_string_pretty(self)
            .map_err(|e| ScanlinkError::Config(format!("Cannot render config: {}", e)))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
