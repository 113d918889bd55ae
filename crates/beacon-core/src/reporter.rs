//! Periodic reporter
//!
//! Drives the whole application once the platform pieces exist:
//!
//! 1. [`Reporter::connect`] joins the network under the configured policy.
//! 2. [`Reporter::greet`] sends the optional boot greeting.
//! 3. [`Reporter::run`] repeats [`Reporter::tick`] forever: one cycle, then
//!    the configured interval.
//!
//! A cycle either skips (link down, association re-issued) or sends exactly
//! one report. Nothing in here returns an error past the cycle boundary; a
//! failed exchange only ends up in the log.

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::config::DeviceConfig;
use crate::link::{self, Connectivity, JoinError, Joined, LinkStatus};
use crate::report::Report;
use crate::transport::{CONTENT_TYPE_JSON, Exchange, RequestError, Session, Transport};

/// Result of one open → post → release exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered(Exchange),
    Failed(RequestError),
}

impl Delivery {
    /// Result code as the HTTP client reports it: the status when positive,
    /// the error code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Delivery::Delivered(exchange) => i32::from(exchange.status),
            Delivery::Failed(err) => err.code(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code() > 0
    }

    fn log(&self) {
        info!("HTTPS Response Code: {}", self.code());
        match self {
            Delivery::Delivered(exchange) => info!("{}", exchange.body),
            Delivery::Failed(err) => error!("Error: {}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Link was down; association re-issued and nothing sent.
    Reconnecting,
    Sent(Delivery),
}

pub struct Reporter<C, T, D> {
    config: DeviceConfig,
    link: C,
    transport: T,
    delay: D,
}

impl<C, T, D> Reporter<C, T, D>
where
    C: Connectivity,
    T: Transport,
    D: DelayNs,
{
    pub fn new(config: DeviceConfig, link: C, transport: T, delay: D) -> Self {
        Self {
            config,
            link,
            transport,
            delay,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn link(&self) -> &C {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut C {
        &mut self.link
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Initial association under the configured [`JoinPolicy`](crate::JoinPolicy).
    pub async fn connect(&mut self) -> Result<Joined, JoinError> {
        link::join(&mut self.link, &self.config.join, &mut self.delay).await
    }

    /// Send the boot greeting, if one is configured and the link is up.
    pub async fn greet(&mut self) -> Option<Delivery> {
        if !self.link.status().is_associated() {
            return None;
        }
        let greeting = self.config.report.greeting.clone()?;
        Some(self.send_report(&greeting).await)
    }

    /// Send a single report carrying `message` right now: open a session,
    /// post, release the session, then log the outcome.
    pub async fn send_report(&mut self, message: &str) -> Delivery {
        let report = Report::new(&self.config.report.device_id, message);
        let delivery = match report.to_json() {
            Ok(body) => {
                let mut session = self.transport.open(&self.config.endpoint);
                let result = session.post(CONTENT_TYPE_JSON, &body).await;
                drop(session);

                match result {
                    Ok(exchange) if exchange.status == 0 => {
                        Delivery::Failed(RequestError::NoHttpServer)
                    }
                    Ok(exchange) => Delivery::Delivered(exchange),
                    Err(err) => Delivery::Failed(err),
                }
            }
            Err(err) => {
                error!("Failed to encode report: {}", err);
                Delivery::Failed(RequestError::SendPayloadFailed)
            }
        };

        delivery.log();
        delivery
    }

    /// One cycle without the trailing wait.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if !self.link.status().is_associated() {
            warn!("WiFi disconnected, reconnecting...");
            self.link.begin_association();
            return CycleOutcome::Reconnecting;
        }

        let message = self.config.report.message.clone();
        CycleOutcome::Sent(self.send_report(&message).await)
    }

    /// One cycle followed by the full interval.
    pub async fn tick(&mut self) -> CycleOutcome {
        let outcome = self.run_cycle().await;
        self.delay.delay_ms(self.config.interval_ms).await;
        outcome
    }

    pub async fn run(&mut self) -> ! {
        info!(
            "Reporting to {} every {} ms",
            self.config.endpoint, self.config.interval_ms
        );
        loop {
            self.tick().await;
        }
    }
}
