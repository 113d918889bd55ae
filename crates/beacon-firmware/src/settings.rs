//! Settings handed over by `build.rs`
//!
//! Values come from the git-ignored `.env` or the build environment and are
//! validated at startup, so a bad setting shows up on the console instead of
//! as a silent misconfiguration.

use beacon_core::config::DeviceConfig;

use crate::error::AppError;

const BUILD_SETTINGS: [(&str, Option<&str>); 12] = [
    ("WIFI_SSID", option_env!("BEACON_WIFI_SSID")),
    ("WIFI_PASSWORD", option_env!("BEACON_WIFI_PASSWORD")),
    ("ENDPOINT_URL", option_env!("BEACON_ENDPOINT_URL")),
    ("DEVICE_ID", option_env!("BEACON_DEVICE_ID")),
    ("MESSAGE", option_env!("BEACON_MESSAGE")),
    ("GREETING", option_env!("BEACON_GREETING")),
    ("INTERVAL_MS", option_env!("BEACON_INTERVAL_MS")),
    ("JOIN_MAX_ATTEMPTS", option_env!("BEACON_JOIN_MAX_ATTEMPTS")),
    ("JOIN_BACKOFF_MS", option_env!("BEACON_JOIN_BACKOFF_MS")),
    ("JOIN_BACKOFF_MAX_MS", option_env!("BEACON_JOIN_BACKOFF_MAX_MS")),
    ("JOIN_ATTEMPT_TIMEOUT_MS", option_env!("BEACON_JOIN_ATTEMPT_TIMEOUT_MS")),
    ("REQUEST_TIMEOUT_MS", option_env!("BEACON_REQUEST_TIMEOUT_MS")),
];

pub fn load() -> Result<DeviceConfig, AppError> {
    let config = DeviceConfig::from_pairs(
        BUILD_SETTINGS
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value))),
    )?;
    Ok(config)
}
