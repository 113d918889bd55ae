//! esp-radio station link
//!
//! `esp_wifi_connect()` is one-shot, so the driver never re-associates on its
//! own. Re-association is driven from the reporter: a blocking attempt during
//! the initial join, a fire-and-forget `connect()` from the cycle loop.

use core::net::Ipv4Addr;

use beacon_core::config::InternetConfig;
use beacon_core::link::{Connectivity, LinkError, LinkStatus};
use embassy_net::Stack;
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::{AuthMethod, ClientConfig, ModeConfig, WifiController, WifiError};
use log::{debug, warn};

pub struct WifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    mode: ModeConfig,
    config_applied: bool,
    attempt_timeout: Duration,
}

impl WifiLink {
    pub fn new(
        controller: WifiController<'static>,
        stack: Stack<'static>,
        internet: &InternetConfig,
        attempt_timeout_ms: u32,
    ) -> Self {
        Self {
            controller,
            stack,
            mode: station_mode(internet),
            config_applied: false,
            attempt_timeout: Duration::from_millis(u64::from(attempt_timeout_ms)),
        }
    }

    async fn ensure_started(&mut self) -> Result<(), LinkError> {
        if !self.config_applied {
            self.controller.set_config(&self.mode).map_err(radio_error)?;
            self.config_applied = true;
        }

        match self.controller.is_started() {
            Ok(true) => Ok(()),
            Ok(false) => self.controller.start_async().await.map_err(radio_error),
            Err(err) => Err(radio_error(err)),
        }
    }

    async fn attempt(&mut self) -> Result<(), LinkError> {
        self.ensure_started().await?;

        if !matches!(self.controller.is_connected(), Ok(true)) {
            self.controller.connect_async().await.map_err(|err| {
                debug!("wifi connect err={:?}", err);
                LinkError::Rejected
            })?;
        }

        // Associated; wait for the DHCP lease.
        self.stack.wait_config_up().await;
        Ok(())
    }
}

impl Connectivity for WifiLink {
    async fn associate(&mut self) -> Result<(), LinkError> {
        let timeout = self.attempt_timeout;
        let result = with_timeout(timeout, self.attempt()).await;

        match result {
            Ok(Ok(())) => {
                if self.stack.config_v4().is_none() {
                    return Err(LinkError::NoAddress);
                }
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                let _ = self.controller.disconnect_async().await;
                Err(LinkError::Timeout)
            }
        }
    }

    fn begin_association(&mut self) {
        if let Err(err) = self.controller.connect() {
            warn!("wifi reconnect request failed: {:?}", err);
        }
    }

    fn status(&self) -> LinkStatus {
        let link_up = matches!(self.controller.is_connected(), Ok(true));
        if link_up && self.stack.is_config_up() {
            LinkStatus::Associated
        } else {
            LinkStatus::NotAssociated
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }
}

fn station_mode(internet: &InternetConfig) -> ModeConfig {
    let auth_method = if internet.password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::Wpa2Personal
    };

    ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(internet.ssid.as_str().into())
            .with_password(internet.password.as_str().into())
            .with_auth_method(auth_method),
    )
}

fn radio_error(err: WifiError) -> LinkError {
    debug!("wifi driver err={:?}", err);
    LinkError::Radio
}
