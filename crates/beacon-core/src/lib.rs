//! Hardware-independent core library for beacon
//!
//! This crate contains all platform-agnostic logic for the beacon WiFi
//! reporter: device configuration, the report payload, the connectivity and
//! transport contracts, the bounded join policy and the periodic reporter
//! loop itself.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod endpoint;
pub mod link;
pub mod report;
pub mod reporter;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, DeviceConfig};
pub use endpoint::{Endpoint, EndpointError};
pub use link::{Connectivity, JoinError, JoinPolicy, Joined, LinkError, LinkStatus};
pub use report::Report;
pub use reporter::{CycleOutcome, Delivery, Reporter};
pub use transport::{Exchange, RequestError, Session, Transport};
