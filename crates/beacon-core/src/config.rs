//! Device configuration
//!
//! Everything deployment-specific lives here: WiFi credentials, the endpoint,
//! what the report says and the timing knobs. The firmware receives the
//! values as key/value pairs from its build environment, the simulator from
//! a TOML file or its process environment.

use alloc::string::{String, ToString};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror_no_std::Error;

use crate::endpoint::{Endpoint, EndpointError};
use crate::link::JoinPolicy;

pub const SSID_MAX: usize = 32;
pub const PASSWORD_MAX: usize = 64;

pub const DEFAULT_DEVICE_ID: &str = "esp32cam";
pub const DEFAULT_MESSAGE: &str = "frame data here";
pub const DEFAULT_GREETING: &str = "hello from PlatformIO";
pub const DEFAULT_INTERVAL_MS: u32 = 3_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 15_000;

/// Prefix accepted (and stripped) in front of every key.
pub const KEY_PREFIX: &str = "BEACON_";

pub type Ssid = heapless::String<SSID_MAX>;
pub type Password = heapless::String<PASSWORD_MAX>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} is longer than {1} bytes")]
    TooLong(&'static str, usize),
    #[error("{0} is not a valid number")]
    InvalidNumber(&'static str),
    #[error("INTERVAL_MS must be at least 1")]
    ZeroInterval,
    #[error("ENDPOINT_URL is invalid: {0}")]
    Endpoint(EndpointError),
}

impl From<EndpointError> for ConfigError {
    fn from(value: EndpointError) -> Self {
        ConfigError::Endpoint(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InternetConfig {
    pub ssid: Ssid,
    #[serde(default)]
    pub password: Password,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    pub device_id: String,
    pub message: String,
    /// Sent once right after the first association. `None` (or a blank
    /// value) skips it.
    #[serde(deserialize_with = "blank_as_none")]
    pub greeting: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID.to_string(),
            message: DEFAULT_MESSAGE.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub internet: InternetConfig,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub join: JoinPolicy,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u32,
}

fn default_interval_ms() -> u32 {
    DEFAULT_INTERVAL_MS
}

fn default_request_timeout_ms() -> u32 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl DeviceConfig {
    /// Build a configuration from `KEY=VALUE` style pairs.
    ///
    /// Keys may carry the [`KEY_PREFIX`]; unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ssid = None;
        let mut password = Password::new();
        let mut endpoint = None;
        let mut report = ReportConfig::default();
        let mut join = JoinPolicy::defaults();
        let mut interval_ms = DEFAULT_INTERVAL_MS;
        let mut request_timeout_ms = DEFAULT_REQUEST_TIMEOUT_MS;

        for (key, value) in pairs {
            let key = key.trim();
            let key = key.strip_prefix(KEY_PREFIX).unwrap_or(key);
            let value = value.trim();

            match key {
                "WIFI_SSID" => ssid = Some(bounded::<SSID_MAX>("WIFI_SSID", value)?),
                "WIFI_PASSWORD" => password = bounded::<PASSWORD_MAX>("WIFI_PASSWORD", value)?,
                "ENDPOINT_URL" => endpoint = Some(Endpoint::parse(value)?),
                "DEVICE_ID" => report.device_id = non_empty("DEVICE_ID", value)?,
                "MESSAGE" => report.message = value.to_string(),
                "GREETING" => report.greeting = non_blank(value),
                "INTERVAL_MS" => interval_ms = number("INTERVAL_MS", value)?,
                "JOIN_MAX_ATTEMPTS" => join.max_attempts = number("JOIN_MAX_ATTEMPTS", value)?,
                "JOIN_BACKOFF_MS" => join.backoff_ms = number("JOIN_BACKOFF_MS", value)?,
                "JOIN_BACKOFF_MAX_MS" => {
                    join.backoff_max_ms = number("JOIN_BACKOFF_MAX_MS", value)?
                }
                "JOIN_ATTEMPT_TIMEOUT_MS" => {
                    join.attempt_timeout_ms = number("JOIN_ATTEMPT_TIMEOUT_MS", value)?
                }
                "REQUEST_TIMEOUT_MS" => {
                    request_timeout_ms = number("REQUEST_TIMEOUT_MS", value)?
                }
                _ => {}
            }
        }

        let config = Self {
            internet: InternetConfig {
                ssid: ssid.ok_or(ConfigError::Missing("WIFI_SSID"))?,
                password,
            },
            endpoint: endpoint.ok_or(ConfigError::Missing("ENDPOINT_URL"))?,
            report,
            join,
            interval_ms,
            request_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that serde cannot express on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.internet.ssid.is_empty() {
            return Err(ConfigError::Empty("WIFI_SSID"));
        }
        if self.report.device_id.is_empty() {
            return Err(ConfigError::Empty("DEVICE_ID"));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

fn bounded<const N: usize>(
    key: &'static str,
    value: &str,
) -> Result<heapless::String<N>, ConfigError> {
    heapless::String::try_from(value).map_err(|_| ConfigError::TooLong(key, N))
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(non_blank))
}

fn non_empty(key: &'static str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty(key));
    }
    Ok(value.to_string())
}

fn number(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber(key))
}
