//! Desktop runner for the beacon reporter.
//!
//! Drives the same `beacon-core` reporter the firmware runs, with the host's
//! network standing in for the WiFi link and a blocking `reqwest` client
//! standing in for the TLS stack. Useful for exercising an endpoint without
//! flashing a board.
//!
//! # Usage
//!
//! ```text
//! beacon-simulator [config.toml]
//! ```
//!
//! Without a path, settings come from `BEACON_*` environment variables (a
//! `.env` in the working directory is loaded first). Set `RUST_LOG=debug`
//! for transport details.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use std::{env, fs, thread};

use anyhow::{Context, Result, anyhow};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use beacon_core::config::KEY_PREFIX;
use beacon_core::{
    Connectivity, DeviceConfig, Endpoint, Exchange, LinkError, LinkStatus, Reporter,
    RequestError, Session, Transport,
};

type HostReporter = Reporter<HostLink, HttpTransport, StdDelay>;

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// The host network as seen from the endpoint's point of view.
///
/// "Associated" means the endpoint host resolves and the OS has a route to
/// it. The route check binds a UDP socket and connects it, which sends
/// nothing but makes the kernel pick a source address.
struct HostLink {
    host: String,
    port: u16,
    peer: Option<SocketAddr>,
}

impl HostLink {
    fn new(endpoint: &Endpoint) -> Self {
        Self {
            host: endpoint.host().to_string(),
            port: endpoint.port(),
            peer: None,
        }
    }

    fn resolve(&self) -> Option<SocketAddr> {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(mut addrs) => addrs.next(),
            Err(err) => {
                debug!("resolving {} failed: {}", self.host, err);
                None
            }
        }
    }

    fn route(&self) -> Option<IpAddr> {
        self.peer.and_then(local_route)
    }
}

fn local_route(peer: SocketAddr) -> Option<IpAddr> {
    let bind: SocketAddr = match peer {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind).ok()?;
    socket.connect(peer).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

impl Connectivity for HostLink {
    async fn associate(&mut self) -> Result<(), LinkError> {
        self.peer = Some(self.resolve().ok_or(LinkError::Rejected)?);
        self.route().map(|_| ()).ok_or(LinkError::NoAddress)
    }

    fn begin_association(&mut self) {
        self.peer = self.resolve();
    }

    fn status(&self) -> LinkStatus {
        if self.route().is_some() {
            LinkStatus::Associated
        } else {
            LinkStatus::NotAssociated
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        match self.route()? {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(addr) => addr.to_ipv4_mapped(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

struct HttpTransport {
    client: Client,
}

struct HttpSession<'s> {
    client: &'s Client,
    endpoint: &'s Endpoint,
}

impl Transport for HttpTransport {
    type Session<'s>
        = HttpSession<'s>
    where
        Self: 's;

    fn open<'s>(&'s mut self, endpoint: &'s Endpoint) -> Self::Session<'s> {
        HttpSession {
            client: &self.client,
            endpoint,
        }
    }
}

impl Session for HttpSession<'_> {
    async fn post(&mut self, content_type: &str, body: &[u8]) -> Result<Exchange, RequestError> {
        let response = self
            .client
            .post(self.endpoint.as_str())
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().map_err(|err| {
            debug!("reading response body failed: {}", err);
            if err.is_timeout() {
                RequestError::ReadTimeout
            } else {
                RequestError::ConnectionLost
            }
        })?;

        Ok(Exchange::new(status, text))
    }
}

/// Map a `reqwest` failure onto the closest result code.
fn classify(err: reqwest::Error) -> RequestError {
    debug!("request failed: {:?}", err);
    if err.is_timeout() {
        RequestError::ReadTimeout
    } else if err.is_connect() {
        RequestError::ConnectionRefused
    } else if err.is_body() {
        RequestError::SendPayloadFailed
    } else if err.is_request() {
        RequestError::SendHeaderFailed
    } else if err.is_decode() {
        RequestError::ConnectionLost
    } else {
        RequestError::NoHttpServer
    }
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Blocks the thread; the reporter is the only thing running.
struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    async fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config() -> Result<DeviceConfig> {
    if let Some(path) = env::args().nth(1) {
        let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        let config: DeviceConfig =
            toml::from_str(&text).with_context(|| format!("parsing {path}"))?;
        config
            .validate()
            .map_err(|err| anyhow!("{path}: invalid configuration: {err}"))?;
        return Ok(config);
    }

    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded {}", path.display());
    }
    let vars = prefixed_vars(env::vars());
    DeviceConfig::from_pairs(vars.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .map_err(|err| anyhow!("invalid configuration: {err}"))
}

/// Only `BEACON_*` variables; unprefixed names like `MESSAGE` are too common
/// in a shell environment to pick up.
fn prefixed_vars(vars: impl Iterator<Item = (String, String)>) -> Vec<(String, String)> {
    vars.filter(|(key, _)| key.starts_with(KEY_PREFIX)).collect()
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

async fn run(mut reporter: HostReporter) -> Result<()> {
    let joined = reporter.connect().await.map_err(|err| anyhow!("{err}"))?;
    debug!("joined after {} attempt(s)", joined.attempts);

    if let Some(delivery) = reporter.greet().await {
        debug!("greeting result code {}", delivery.code());
    }

    reporter.run().await
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let timeout = Duration::from_millis(u64::from(config.request_timeout_ms));
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .context("building HTTP client")?;

    info!(
        "beacon simulator: device {} -> {}",
        config.report.device_id, config.endpoint
    );

    let link = HostLink::new(&config.endpoint);
    let transport = HttpTransport { client };
    block_on(run(Reporter::new(config, link, transport, StdDelay)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_vars_skip_foreign_keys() {
        let vars = vec![
            ("MESSAGE".to_string(), "shell".to_string()),
            ("BEACON_MESSAGE".to_string(), "beacon".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];
        assert_eq!(
            prefixed_vars(vars.into_iter()),
            vec![("BEACON_MESSAGE".to_string(), "beacon".to_string())]
        );
    }

    #[test]
    fn test_loopback_link_associates() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8080/ingest").unwrap();
        let mut link = HostLink::new(&endpoint);
        assert_eq!(link.status(), LinkStatus::NotAssociated);

        block_on(link.associate()).unwrap();
        assert_eq!(link.status(), LinkStatus::Associated);
        assert_eq!(link.local_address(), Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_unresolvable_host_is_rejected() {
        let endpoint = Endpoint::parse("http://beacon.invalid/ingest").unwrap();
        let mut link = HostLink::new(&endpoint);
        assert_eq!(block_on(link.associate()), Err(LinkError::Rejected));
        assert_eq!(link.status(), LinkStatus::NotAssociated);
    }
}
