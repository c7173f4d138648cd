//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use chat_core::{MessageType, PublicPayloadFormat};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub env: Environment,
    /// WebSocket endpoint of the chat server
    pub server_url: String,
    pub keepalive: KeepaliveConfig,
    pub queue: QueueConfig,
    /// Grace period for the server to confirm a close before it is forced
    pub close_timeout: Duration,
    pub auto_reconnect: AutoReconnectConfig,
    /// Layout of PUBLIC payloads on the wire
    pub public_format: PublicPayloadFormat,
    /// Message types the server is known to accept
    pub supported_types: Vec<MessageType>,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(other.to_string()),
        }
    }
}

/// Keepalive configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Delay between PING messages
    pub interval: Duration,
    /// Close the connection when nothing arrives for twice the interval
    pub liveness_timeout: bool,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: default_keepalive_interval(),
            liveness_timeout: false,
        }
    }
}

/// Outbound queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of sends held while not connected
    pub capacity: usize,
    /// Keep buffering after the connection was lost
    pub buffer_when_disconnected: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            buffer_when_disconnected: false,
        }
    }
}

/// Automatic reconnection with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoReconnectConfig {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl AutoReconnectConfig {
    /// Backoff delay before reconnect attempt `attempt` (0-based), without jitter
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let max_ms = self.max_delay.as_millis() as f64;
        let scaled = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        if scaled.is_nan() || scaled >= max_ms {
            return self.max_delay;
        }
        Duration::from_millis(scaled.round() as u64)
    }
}

impl Default for AutoReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            server_url: default_server_url(),
            keepalive: KeepaliveConfig::default(),
            queue: QueueConfig::default(),
            close_timeout: default_close_timeout(),
            auto_reconnect: AutoReconnectConfig::default(),
            public_format: PublicPayloadFormat::default(),
            supported_types: MessageType::ALL.to_vec(),
        }
    }
}

// Default value functions
fn default_server_url() -> String {
    "ws://127.0.0.1:8080/websock".to_string()
}

fn default_keepalive_interval() -> Duration {
    Duration::from_millis(120_000)
}

fn default_queue_capacity() -> usize {
    256
}

fn default_close_timeout() -> Duration {
    Duration::from_millis(5_000)
}

impl ClientConfig {
    /// Create a default configuration pointing at `server_url`
    pub fn with_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Check if the server accepts messages of `kind`
    #[must_use]
    pub fn supports(&self, kind: MessageType) -> bool {
        self.supported_types.contains(&kind)
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed, or the
    /// resulting configuration is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            env: parse_var(&lookup, "APP_ENV")?.unwrap_or_default(),
            server_url: lookup("CHAT_SERVER_URL").unwrap_or(defaults.server_url),
            keepalive: KeepaliveConfig {
                interval: parse_millis(&lookup, "CHAT_KEEPALIVE_INTERVAL_MS")?
                    .unwrap_or(defaults.keepalive.interval),
                liveness_timeout: parse_bool(&lookup, "CHAT_LIVENESS_TIMEOUT")?
                    .unwrap_or(defaults.keepalive.liveness_timeout),
            },
            queue: QueueConfig {
                capacity: parse_var(&lookup, "CHAT_QUEUE_CAPACITY")?
                    .unwrap_or(defaults.queue.capacity),
                buffer_when_disconnected: parse_bool(&lookup, "CHAT_BUFFER_WHEN_DISCONNECTED")?
                    .unwrap_or(defaults.queue.buffer_when_disconnected),
            },
            close_timeout: parse_millis(&lookup, "CHAT_CLOSE_TIMEOUT_MS")?
                .unwrap_or(defaults.close_timeout),
            auto_reconnect: AutoReconnectConfig {
                enabled: parse_bool(&lookup, "CHAT_AUTO_RECONNECT")?
                    .unwrap_or(defaults.auto_reconnect.enabled),
                initial_delay: parse_millis(&lookup, "CHAT_RECONNECT_INITIAL_DELAY_MS")?
                    .unwrap_or(defaults.auto_reconnect.initial_delay),
                max_delay: parse_millis(&lookup, "CHAT_RECONNECT_MAX_DELAY_MS")?
                    .unwrap_or(defaults.auto_reconnect.max_delay),
                backoff_factor: parse_var(&lookup, "CHAT_RECONNECT_BACKOFF_FACTOR")?
                    .unwrap_or(defaults.auto_reconnect.backoff_factor),
            },
            public_format: parse_var(&lookup, "CHAT_PUBLIC_PAYLOAD")?
                .unwrap_or(defaults.public_format),
            supported_types: match lookup("CHAT_SERVER_TYPES") {
                Some(list) => parse_type_list(&list)?,
                None => defaults.supported_types,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the individual parsers cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(
                "CHAT_SERVER_URL",
                format!("expected a ws:// or wss:// URL, got {}", self.server_url),
            ));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_QUEUE_CAPACITY",
                "must be at least 1".to_string(),
            ));
        }
        if self.keepalive.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CHAT_KEEPALIVE_INTERVAL_MS",
                "must be greater than 0".to_string(),
            ));
        }
        if self.close_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CHAT_CLOSE_TIMEOUT_MS",
                "must be greater than 0".to_string(),
            ));
        }
        if self.auto_reconnect.enabled {
            if self.auto_reconnect.initial_delay.is_zero() {
                return Err(ConfigError::InvalidValue(
                    "CHAT_RECONNECT_INITIAL_DELAY_MS",
                    "must be greater than 0".to_string(),
                ));
            }
            if self.auto_reconnect.max_delay < self.auto_reconnect.initial_delay {
                return Err(ConfigError::InvalidValue(
                    "CHAT_RECONNECT_MAX_DELAY_MS",
                    "must not be below the initial delay".to_string(),
                ));
            }
            if self.auto_reconnect.backoff_factor.is_nan() || self.auto_reconnect.backoff_factor < 1.0 {
                return Err(ConfigError::InvalidValue(
                    "CHAT_RECONNECT_BACKOFF_FACTOR",
                    format!("must be >= 1.0, got {}", self.auto_reconnect.backoff_factor),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw.clone()))
        })
        .transpose()
}

fn parse_millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_var::<_, u64>(lookup, key)?.map(Duration::from_millis))
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key, raw.clone())),
        })
        .transpose()
}

fn parse_type_list(list: &str) -> Result<Vec<MessageType>, ConfigError> {
    let mut types = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = item
            .parse::<MessageType>()
            .map_err(|_| ConfigError::InvalidValue("CHAT_SERVER_TYPES", item.to_string()))?;
        if !types.contains(&kind) {
            types.push(kind);
        }
    }
    Ok(types)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
