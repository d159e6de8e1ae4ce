//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub heartbeat: HeartbeatConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
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

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Listener configuration for the gateway
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
        }
    }
}

/// Node liveness and outbound write settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between two liveness sweeps, in milliseconds
    pub interval_ms: u64,
    /// Consecutive unanswered sweeps tolerated before a connection is reaped
    pub max_missed: u32,
    /// Upper bound for a single outbound write, in milliseconds
    pub write_timeout_ms: u64,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
}

impl HeartbeatConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Check that every setting is strictly positive
    ///
    /// Errors name the environment variable the setting is read from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive(self.interval_ms, "HEARTBEAT_INTERVAL_MS")?;
        positive(self.max_missed, "HEARTBEAT_MAX_MISSED")?;
        positive(self.write_timeout_ms, "WRITE_TIMEOUT_MS")?;
        positive(self.outbound_buffer, "OUTBOUND_BUFFER")?;
        Ok(())
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
            max_missed: default_max_missed(),
            write_timeout_ms: default_write_timeout_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "nova-gateway".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_max_missed() -> u32 {
    3
}

fn default_write_timeout_ms() -> u64 {
    5_000
}

fn default_outbound_buffer() -> usize {
    64
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV") {
            Some(raw) => Environment::parse(&raw).ok_or(ConfigError::InvalidValue("APP_ENV", raw))?,
            None => Environment::default(),
        };

        let heartbeat = HeartbeatConfig {
            interval_ms: parse_or(&lookup, "HEARTBEAT_INTERVAL_MS", default_heartbeat_interval_ms)?,
            max_missed: parse_or(&lookup, "HEARTBEAT_MAX_MISSED", default_max_missed)?,
            write_timeout_ms: parse_or(&lookup, "WRITE_TIMEOUT_MS", default_write_timeout_ms)?,
            outbound_buffer: parse_or(&lookup, "OUTBOUND_BUFFER", default_outbound_buffer)?,
        };
        heartbeat.validate()?;

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_required(&lookup, "GATEWAY_PORT")?,
            },
            heartbeat,
        })
    }
}

fn parse_required<F, T>(lookup: &F, key: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key).ok_or(ConfigError::MissingVar(key))?;
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key, raw))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

fn positive<T>(value: T, key: &'static str) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(key, value.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
