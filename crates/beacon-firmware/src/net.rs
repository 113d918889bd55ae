//! Radio and network stack bring-up

use embassy_net::{Runner, Stack, StackResources};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{WifiController, WifiDevice};
use log::error;
use static_cell::StaticCell;

use crate::error::AppError;

// DHCP, DNS and the single HTTPS connection.
const STACK_SOCKETS: usize = 3;

pub struct NetworkRuntime {
    pub controller: WifiController<'static>,
    pub stack: Stack<'static>,
    pub runner: Runner<'static, WifiDevice<'static>>,
}

pub fn setup(wifi: WIFI<'static>, rng: Rng) -> Result<NetworkRuntime, AppError> {
    static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    static STACK_RESOURCES: StaticCell<StackResources<STACK_SOCKETS>> = StaticCell::new();

    let radio_ctrl = esp_radio::init().map_err(|err| {
        error!("esp_radio::init err={:?}", err);
        AppError::Radio
    })?;
    let radio_ctrl = RADIO_CTRL.init(radio_ctrl);

    let (controller, interfaces) =
        esp_radio::wifi::new(radio_ctrl, wifi, Default::default()).map_err(|err| {
            error!("esp_radio::wifi::new err={:?}", err);
            AppError::Wifi
        })?;

    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::<STACK_SOCKETS>::new()),
        seed,
    );

    Ok(NetworkRuntime {
        controller,
        stack,
        runner,
    })
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
