//! ESP32-S3 firmware-specific modules for beacon
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: radio and network stack bring-up, the esp-radio WiFi link, the
//! TLS transport over embassy-net and the build-time settings.

#![no_std]

extern crate alloc;

pub mod error;
pub mod https;
pub mod net;
pub mod settings;
pub mod wifi;
