//! Room controller configuration.
//!
//! Configuration is loaded from environment variables. The session token is
//! redacted in Debug output.

use crate::collaborators::SessionCredentials;

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default publisher display name.
pub const DEFAULT_PUBLISHER_NAME: &str = "room-publisher";

/// Default telemetry sampling interval in milliseconds.
pub const DEFAULT_TELEMETRY_INTERVAL_MS: u64 = 1000;

/// Default Prometheus listener address.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:9091";

/// Camera capture resolution for the local publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureResolution {
    Low,
    Medium,
    High,
}

impl CaptureResolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CaptureResolution::Low => "low",
            CaptureResolution::Medium => "medium",
            CaptureResolution::High => "high",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(CaptureResolution::Low),
            "medium" => Some(CaptureResolution::Medium),
            "high" => Some(CaptureResolution::High),
            _ => None,
        }
    }
}

/// Camera capture frame rate for the local publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFrameRate {
    Fps1,
    Fps7,
    Fps15,
    Fps30,
}

impl CaptureFrameRate {
    #[must_use]
    pub const fn fps(self) -> u32 {
        match self {
            CaptureFrameRate::Fps1 => 1,
            CaptureFrameRate::Fps7 => 7,
            CaptureFrameRate::Fps15 => 15,
            CaptureFrameRate::Fps30 => 30,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(CaptureFrameRate::Fps1),
            "7" => Some(CaptureFrameRate::Fps7),
            "15" => Some(CaptureFrameRate::Fps15),
            "30" => Some(CaptureFrameRate::Fps30),
            _ => None,
        }
    }
}

/// Local publisher settings handed to the transport once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherSettings {
    pub name: String,
    pub resolution: CaptureResolution,
    pub frame_rate: CaptureFrameRate,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_PUBLISHER_NAME.to_string(),
            resolution: CaptureResolution::Medium,
            frame_rate: CaptureFrameRate::Fps30,
        }
    }
}

/// Room controller configuration.
#[derive(Clone)]
pub struct Config {
    /// Media session to join.
    pub session_id: String,

    /// Project API key for the media service.
    pub api_key: String,

    /// Session token.
    /// Protected by `SecretString` to prevent accidental logging.
    pub token: SecretString,

    /// Local publisher settings.
    pub publisher: PublisherSettings,

    /// How often the telemetry sampler reports while connected.
    pub telemetry_interval: Duration,

    /// Promote the grid tail when the featured participant leaves.
    pub auto_promote_on_featured_leave: bool,

    /// Prometheus listener address (default: "0.0.0.0:9091").
    pub metrics_bind_address: String,

    /// Optional JSON-lines event script replayed by the binary.
    pub event_script: Option<String>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("session_id", &self.session_id)
            .field("api_key", &self.api_key)
            .field("token", &"[REDACTED]")
            .field("publisher", &self.publisher)
            .field("telemetry_interval", &self.telemetry_interval)
            .field(
                "auto_promote_on_featured_leave",
                &self.auto_promote_on_featured_leave,
            )
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("event_script", &self.event_script)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let session_id = required(vars, "ROOM_SESSION_ID")?;
        let api_key = required(vars, "ROOM_API_KEY")?;
        let token = SecretString::from(required(vars, "ROOM_TOKEN")?);

        let name = vars
            .get("ROOM_PUBLISHER_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PUBLISHER_NAME.to_string());

        let resolution = match vars.get("ROOM_PUBLISHER_RESOLUTION") {
            Some(value) => CaptureResolution::parse(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "ROOM_PUBLISHER_RESOLUTION must be low, medium or high, got {value}"
                ))
            })?,
            None => CaptureResolution::Medium,
        };

        let frame_rate = match vars.get("ROOM_PUBLISHER_FPS") {
            Some(value) => CaptureFrameRate::parse(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "ROOM_PUBLISHER_FPS must be 1, 7, 15 or 30, got {value}"
                ))
            })?,
            None => CaptureFrameRate::Fps30,
        };

        let telemetry_interval_ms = match vars.get("ROOM_TELEMETRY_INTERVAL_MS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "ROOM_TELEMETRY_INTERVAL_MS must be a positive integer, got {value}"
                    ))
                })?,
            None => DEFAULT_TELEMETRY_INTERVAL_MS,
        };

        let auto_promote_on_featured_leave = vars
            .get("ROOM_AUTO_PROMOTE_ON_FEATURED_LEAVE")
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        let metrics_bind_address = vars
            .get("ROOM_METRICS_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());

        let event_script = vars.get("ROOM_EVENT_SCRIPT").cloned();

        Ok(Config {
            session_id,
            api_key,
            token,
            publisher: PublisherSettings {
                name,
                resolution,
                frame_rate,
            },
            telemetry_interval: Duration::from_millis(telemetry_interval_ms),
            auto_promote_on_featured_leave,
            metrics_bind_address,
            event_script,
        })
    }

    /// Credentials for [`crate::collaborators::Transport::connect`].
    #[must_use]
    pub fn credentials(&self) -> SessionCredentials {
        SessionCredentials {
            api_key: self.api_key.clone(),
            session_id: self.session_id.clone(),
            token: self.token.clone(),
        }
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}
