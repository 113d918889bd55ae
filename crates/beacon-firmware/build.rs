use std::env;

use dotenvy::from_path;

/// Settings forwarded from `.env` (or the build environment) to the firmware.
const SETTINGS: [&str; 12] = [
    "WIFI_SSID",
    "WIFI_PASSWORD",
    "ENDPOINT_URL",
    "DEVICE_ID",
    "MESSAGE",
    "GREETING",
    "INTERVAL_MS",
    "JOIN_MAX_ATTEMPTS",
    "JOIN_BACKOFF_MS",
    "JOIN_BACKOFF_MAX_MS",
    "JOIN_ATTEMPT_TIMEOUT_MS",
    "REQUEST_TIMEOUT_MS",
];

fn main() {
    let _ = from_path(".env");

    println!("cargo:rerun-if-changed=.env");

    for setting in SETTINGS {
        let name = format!("BEACON_{setting}");
        println!("cargo:rerun-if-env-changed={name}");
        if let Ok(value) = env::var(&name) {
            println!("cargo:rustc-env={name}={value}");
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
