#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use beacon_core::Reporter;
use beacon_firmware::https::HttpsTransport;
use beacon_firmware::net::{self, net_task};
use beacon_firmware::settings;
use beacon_firmware::wifi::WifiLink;
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{LevelFilter, error, info, warn};

/// Pause before starting a fresh join cycle once the policy is exhausted.
const REJOIN_COOLDOWN: Duration = Duration::from_secs(30);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    esp_println::println!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let device_config = match settings::load() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            halt().await
        }
    };

    if !device_config.endpoint.is_secure() {
        warn!(
            "Endpoint {} is not HTTPS; reports travel in clear text",
            device_config.endpoint
        );
    }

    let rng = Rng::new();
    let runtime = match net::setup(peripherals.WIFI, rng) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("{}", err);
            halt().await
        }
    };
    spawner.must_spawn(net_task(runtime.runner));

    let link = WifiLink::new(
        runtime.controller,
        runtime.stack,
        &device_config.internet,
        device_config.join.attempt_timeout_ms,
    );
    let transport = HttpsTransport::new(runtime.stack, rng, device_config.request_timeout_ms);
    let mut reporter = Reporter::new(device_config, link, transport, Delay);

    while let Err(err) = reporter.connect().await {
        error!("{}; retrying in {}s", err, REJOIN_COOLDOWN.as_secs());
        Timer::after(REJOIN_COOLDOWN).await;
    }

    if let Some(delivery) = reporter.greet().await {
        info!("Greeting delivered: {}", delivery.is_success());
    }

    reporter.run().await
}
