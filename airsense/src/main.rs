// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - Firmware
//!
//! To use, set the AIRSENSE_SSID and AIRSENSE_PASSWORD environment variables
//! to your WiFi network's credentials and then build and flash the project.
//!
//! Wiring (ESP32-C3):
//! - DHT11 data line on GPIO5
//! - MQ-135 analog output on GPIO3 (ADC1 channel 3)
//!
//! Once associated, the station listens for WebSocket connections on port 81
//! and pushes a `{"temperature":..,"humidity":..,"aqi":..}` record to every
//! listener every 9 seconds.
//!
//! Features:
//! - `wifi-log`: Enables `esp-wifi` logging.
//!
//! To change other configuration:
//! - `StationConfig` in `main()` holds the port, poll interval, sensor type
//!   and association policy.
//! - `HEAP_SIZE` and `NUM_SOCKETS` are set below.
//! - `ws::MAX_LISTENERS` is the number of simultaneous listeners.

#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![feature(type_alias_impl_trait)]
#![feature(impl_trait_in_assoc_type)]

extern crate alloc;
use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Delay, Duration, Timer};
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_assertions::const_assert_eq;
use static_cell::make_static;

use airsense_core::config::{DEFAULT_CLIMATE_PIN, DEFAULT_GAS_PIN};
use airsense_core::sensor::mq135::Mq135;
use airsense_core::{BreakpointTable, Station, StationConfig, wait_for_association};
use airsense_util::net::{Control as WifiControl, StaConfig, Status as WifiStatus, Wifi};

mod error;
mod sensor;
mod ws;

use sensor::{Dht, Mq135Sensor};
use ws::WsBroadcaster;

include!(concat!(env!("OUT_DIR"), "/built.rs"));
pub const AIRSENSE_BUILD_TIME: &str = env!("AIRSENSE_BUILD_TIME");
pub const AIRSENSE_BUILD_DATE: &str = env!("AIRSENSE_BUILD_DATE");

// Creates app-descriptor required by the esp-idf bootloader, with the build
// time and date of this firmware rather than of esp-bootloader-esp-idf.
esp_bootloader_esp_idf::esp_app_desc!(
    PKG_VERSION,
    PKG_NAME,
    AIRSENSE_BUILD_TIME,
    AIRSENSE_BUILD_DATE,
    esp_bootloader_esp_idf::ESP_IDF_COMPATIBLE_VERSION,
    esp_bootloader_esp_idf::MMU_PAGE_SIZE,
    0,
    u16::MAX
);

// WiFi credentials, fixed at build time.
const SSID: &str = env!("AIRSENSE_SSID");
const PASSWORD: &str = env!("AIRSENSE_PASSWORD");

// Heap size for the application.
pub const HEAP_SIZE: usize = 96 * 1024;

// One socket per listener, one for DHCP, plus spares.
const NUM_SOCKETS: usize = ws::MAX_LISTENERS + 1 + 3;

// Time to wait before resetting after a fatal startup error.
const RESET_DELAY: Duration = Duration::from_secs(1);

// The drivers below are wired to these pins.
const_assert_eq!(DEFAULT_CLIMATE_PIN, 5);
const_assert_eq!(DEFAULT_GAS_PIN, 3);

// airsense firmware's main function:
// - Set up the HAL, heap and embassy
// - Set up the sensors
// - Start WiFi and wait, for a bounded time, to associate
// - Start the WebSocket listeners
// - Run the poll and broadcast loop forever
#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    // Set up the logger
    esp_println::logger::init_logger_from_env();

    info!("*** airsense ***");

    // Set up the HAL
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    let clocks = esp_hal::clock::Clocks::get();
    info!(
        "Value: {} running at {}MHz",
        esp_hal::chip!(),
        clocks.cpu_clock.as_mhz()
    );

    // Set up the heap allocator
    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    // Initialize embassy
    let timg1 = TimerGroup::new(peripherals.TIMG1);
    esp_hal_embassy::init(timg1.timer0);

    let config = StationConfig::with_wifi(SSID, PASSWORD);
    info!("Info:  {config:?}");

    // Set up the sensors
    let dht = Dht::new(peripherals.GPIO5, config.climate_sensor);
    let mq135 = Mq135Sensor::new(peripherals.ADC1, peripherals.GPIO3, Mq135::default());

    // Set up WiFi and start the WiFi connection and networking tasks
    let stack_resources = make_static!(StackResources::<NUM_SOCKETS>::new());
    let sta_config = StaConfig {
        ssid: config.wifi.ssid.clone(),
        password: config.wifi.password.clone(),
        net: embassy_net::Config::dhcpv4(Default::default()),
    };
    let mut wifi = match Wifi::builder()
        .with_sta_if(sta_config, stack_resources)
        .build(
            &spawner,
            peripherals.TIMG0,
            peripherals.RNG,
            peripherals.WIFI,
        ) {
        Ok(wifi) => wifi,
        Err(e) => reset(e).await,
    };
    trace!("Ok:    WiFi interface initialized");
    wifi.must_spawn();

    info!("Exec:  Start WiFi station");
    match wifi.control_and_wait(WifiControl::Enable).await {
        WifiStatus::Enabled => debug!("Ok:    WiFi station enabled"),
        status => reset(format!("WiFi station failed to start, status {status:?}")).await,
    }

    // Wait for the link and an IP address, giving up and resetting if they
    // don't arrive.  The station is stopped first, so the access point sees
    // it leave.
    let mut association = wifi.association();
    if let Err(e) = wait_for_association(&mut association, &mut Delay, &config.association).await {
        info!("Exec:  Stop WiFi station");
        let status = wifi.control_and_wait(WifiControl::Disable).await;
        debug!("Info:  WiFi station {status:?}");
        reset(e).await;
    }

    let stack = wifi.net_stack();
    let address = wifi
        .ipv4()
        .map(|ipv4| ipv4.address.address().to_string())
        .unwrap_or_else(|| String::from("unknown"));
    info!("Ok:    Serving on ws://{address}:{}/", config.server_port);

    // Start the WebSocket listener tasks
    ws::start(stack, config.server_port, &spawner);

    // The main task now becomes the poll and broadcast loop
    let mut station = Station::new(
        &config,
        BreakpointTable::CO2,
        dht,
        mq135,
        WsBroadcaster::new(),
        Delay,
    );
    station.run().await
}

// Logs a fatal startup error, then resets.
async fn reset(error: impl fmt::Display) -> ! {
    error!("Error: {error}, resetting in {}s", RESET_DELAY.as_secs());
    Timer::after(RESET_DELAY).await;
    esp_hal::system::software_reset()
}
