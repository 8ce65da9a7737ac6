// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-util - Networking helpers
//!
//! The [`Wifi`] object brings up airsense's WiFi station interface and the
//! `embassy-net` stack that runs over it.
//!
//! # Example
//! ```rust,ignore
//! use airsense_util::net::{Control, StaConfig, Status, Wifi};
//! use embassy_net::StackResources;
//!
//! let stack_resources = make_static!(StackResources::<8>::new());
//! let sta_config = StaConfig {
//!     ssid: String::from("MyNetwork"),
//!     password: String::from("password123"),
//!     net: embassy_net::Config::dhcpv4(Default::default()),
//! };
//!
//! // <8> is the number of sockets the network stack supports
//! let mut wifi = Wifi::builder::<8>()
//!     .with_sta_if(sta_config, stack_resources)
//!     .build(&spawner, timg0, rng, wifi_hw)?;
//!
//! // Spawn the WiFi and networking tasks, then start the station
//! wifi.must_spawn();
//! if wifi.control_and_wait(Control::Enable).await != Status::Enabled {
//!     // The station failed to start
//! }
//!
//! // Hand the association check to airsense-core
//! let mut association = wifi.association();
//! if wait_for_association(&mut association, &mut Delay, &policy).await.is_err() {
//!     // Take the station down before giving up on the network
//!     wifi.control_and_wait(Control::Disable).await;
//! }
//! ```

use alloc::format;
use alloc::string::String;
use core::fmt;
use core::future::pending;
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::{Config as NetConfig, Runner, Stack, StackResources, StaticConfigV4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use esp_hal::peripherals::{RNG, TIMG0, WIFI};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_wifi::wifi::{
    ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent, WifiMode,
};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

use airsense_core::AssociationProvider;

// Pause before retrying a failed connection attempt.
const RECONNECT_DELAY_MS: u64 = 1000;

/// Error type for WiFi operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Hit error in the esp-wifi stack
    Wifi(String),

    /// Configuration error, e.g. missing required configuration
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Wifi(msg) => write!(f, "WiFi stack error: {msg}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

/// WiFi controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Enable the station interface
    Enable,

    /// Disable the station interface
    Disable,
}

/// WiFi station status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Enabled,
    Disabled,
    Connected,
    Disconnected,
}

// Commands the WiFi controller task, and reports changes in station state.
static CONTROL: Signal<CriticalSectionRawMutex, Control> = Signal::new();
static STATUS: Signal<CriticalSectionRawMutex, Status> = Signal::new();

/// Configuration for the station interface.
// Not derived, as printing embassy-net's Config has been seen to crash, and
// the password must not be logged.
#[derive(Clone)]
pub struct StaConfig {
    /// SSID of the WiFi network
    pub ssid: String,

    /// Password for the WiFi network
    pub password: String,

    /// Network configuration, either static or DHCP
    pub net: NetConfig,
}

impl fmt::Debug for StaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaConfig")
            .field("ssid", &self.ssid)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// Builder for [`Wifi`].  Use [`Wifi::builder`] to create one.
#[derive(Default)]
pub struct WifiBuilder<const SOCKETS: usize> {
    sta_config: Option<StaConfig>,
    stack_resources: Option<&'static mut StackResources<SOCKETS>>,
}

impl<const SOCKETS: usize> WifiBuilder<SOCKETS> {
    /// Adds the station interface configuration to the builder.
    ///
    /// Arguments:
    /// - `config`: The SSID, password and network configuration
    /// - `stack_resources`: The static resources `embassy-net` requires
    pub fn with_sta_if(
        mut self,
        config: StaConfig,
        stack_resources: &'static mut StackResources<SOCKETS>,
    ) -> Self {
        self.sta_config = Some(config);
        self.stack_resources = Some(stack_resources);
        self
    }

    /// Builds the WiFi controller and network stack.
    ///
    /// After this function you likely want to call [`Wifi::must_spawn`] to
    /// start the WiFi and networking tasks.
    ///
    /// Returns:
    /// - `Ok(Wifi)` if the WiFi interface was built successfully.
    /// - `Err(Error)` if no station interface was configured, or `esp-wifi`
    ///   failed to initialize.
    pub fn build(
        self,
        spawner: &Spawner,
        timg0: TIMG0<'static>,
        rng: RNG<'static>,
        wifi: WIFI<'static>,
    ) -> Result<Wifi, Error> {
        let (Some(sta_config), Some(stack_resources)) = (self.sta_config, self.stack_resources)
        else {
            return Err(Error::Config(String::from("No STA interface configured")));
        };

        let timg0 = TimerGroup::new(timg0);
        let mut rng = Rng::new(rng);

        // esp_wifi expects an immutable static reference to its controller
        let esp_wifi_ctrl = esp_wifi::init(timg0.timer0, rng)
            .map_err(|e| Error::Wifi(format!("Failed to initialize esp-wifi: {e:?}")))?;
        let esp_wifi_ctrl = &*make_static!(esp_wifi_ctrl);
        let (mut controller, interfaces) = esp_wifi::wifi::new(esp_wifi_ctrl, wifi)
            .map_err(|e| Error::Wifi(format!("Failed to create WiFi controller: {e:?}")))?;

        configure_wifi(&mut controller, &sta_config)?;

        debug!(
            "Info:  Configuring STA interface with SSID: {}",
            sta_config.ssid
        );
        let seed = (rng.random() as u64) << 32 | rng.random() as u64;
        let (stack, runner) =
            embassy_net::new(interfaces.sta, sta_config.net, stack_resources, seed);

        Ok(Wifi {
            spawner: *spawner,
            controller: Some(controller),
            stack,
            runner: Some(runner),
        })
    }
}

// Applies the station configuration to the WiFi controller.
fn configure_wifi(
    controller: &mut WifiController<'static>,
    sta_config: &StaConfig,
) -> Result<(), Error> {
    // Avoid power saving mode for more reliable WiFi
    controller
        .set_power_saving(esp_wifi::config::PowerSaveMode::None)
        .inspect_err(|e| {
            error!("Error: Failed to set power WiFi saving mode {e:?}");
        })
        .ok();

    let config = Configuration::Client(ClientConfiguration {
        ssid: sta_config.ssid.clone(),
        password: sta_config.password.clone(),
        ..Default::default()
    });

    controller
        .set_configuration(&config)
        .inspect(|_| trace!("Ok:    WiFi configuration set successfully"))
        .map_err(|e| Error::Wifi(format!("Failed to set WiFi configuration: {e:?}")))
}

/// WiFi station and its network stack.
///
/// See [`Wifi::builder`] and the module documentation for usage.
pub struct Wifi {
    spawner: Spawner,
    controller: Option<WifiController<'static>>,
    stack: Stack<'static>,
    runner: Option<Runner<'static, WifiDevice<'static>>>,
}

impl Wifi {
    /// Creates a new WiFi builder.
    ///
    /// Generics:
    /// - `SOCKETS`: The number of sockets the network stack supports
    pub fn builder<const SOCKETS: usize>() -> WifiBuilder<SOCKETS> {
        WifiBuilder::default()
    }

    /// Spawns the networking and WiFi controller tasks.  The networking task
    /// is spawned first, so it is ready to handle events when the WiFi
    /// connection is established.
    ///
    /// Panics if the tasks cannot be spawned.
    pub fn must_spawn(&mut self) {
        if let Some(runner) = self.runner.take() {
            self.spawner.must_spawn(net_task(runner));
        }

        match self.controller.take() {
            Some(controller) => self.spawner.must_spawn(wifi_controller(controller)),
            None => warn!("Warn:  WiFi controller task already spawned"),
        }
    }

    /// Enables or disables the station.  Use [`Self::wait_for_control_update`]
    /// to wait for the change to be applied.
    pub fn control(&self, control: Control) {
        CONTROL.signal(control);
    }

    /// Waits for the next status update from the WiFi controller task.
    pub async fn wait_for_control_update(&self) -> Status {
        STATUS.wait().await
    }

    /// Enables or disables the station and waits for the change to be
    /// applied.
    ///
    /// Returns [`Status::Enabled`] or [`Status::Disabled`], whichever state
    /// the station is in once the controller task has acted on `control`.
    pub async fn control_and_wait(&self, control: Control) -> Status {
        // Drop any connection status not yet consumed, so the reply to this
        // control is the next status seen
        STATUS.reset();
        self.control(control);
        self.wait_for_control_update().await
    }

    /// The station's network stack.
    pub fn net_stack(&self) -> Stack<'static> {
        self.stack
    }

    /// The station's IPv4 configuration, if it has one.
    pub fn ipv4(&self) -> Option<StaticConfigV4> {
        self.stack.config_v4()
    }

    /// An [`AssociationProvider`] over the station's network stack.
    pub fn association(&self) -> StaAssociation {
        StaAssociation { stack: self.stack }
    }
}

/// Reports the station as associated once its link is up and it holds an
/// IPv4 address.
#[derive(Clone, Copy)]
pub struct StaAssociation {
    stack: Stack<'static>,
}

impl AssociationProvider for StaAssociation {
    async fn is_associated(&mut self) -> bool {
        let link_up = self.stack.is_link_up();
        let config = self.stack.config_v4();
        trace!("Info:  Link up: {link_up} IPv4: {}", config.is_some());
        if let (true, Some(config)) = (link_up, config) {
            info!("Ok:    Received IP {}", config.address);
            true
        } else {
            false
        }
    }
}

// Station interface events used by `sta_future()`.
enum StaEvent {
    Connected,
    Disconnected,
}

// Connects the station, or waits for it to disconnect.  Having a single async
// function allows this call to be put in a single select arm.
async fn sta_future(
    controller: &mut WifiController<'_>,
    enabled: bool,
    connected: bool,
) -> StaEvent {
    if !enabled {
        return pending().await;
    }

    if !connected {
        info!("Exec:  Connecting WiFi station");
        match controller.connect_async().await {
            Ok(()) => {
                info!("Ok:    WiFi station connected");
                STATUS.signal(Status::Connected);
                StaEvent::Connected
            }
            Err(e) => {
                warn!("Error: WiFi station failed to connect: {e:?}");
                Timer::after_millis(RECONNECT_DELAY_MS).await;
                StaEvent::Disconnected
            }
        }
    } else {
        controller
            .wait_for_all_events(WifiEvent::StaDisconnected.into(), false)
            .await;
        warn!("Warn:  WiFi station disconnected");
        STATUS.signal(Status::Disconnected);
        StaEvent::Disconnected
    }
}

// Starts and stops the station on demand, and keeps it connected while it is
// enabled.
#[embassy_executor::task]
async fn wifi_controller(mut controller: WifiController<'static>) -> ! {
    debug!(
        "Info:  WiFi device capabilities: {:?}",
        controller.capabilities()
    );

    let mut enabled = false;
    let mut connected = false;

    loop {
        let control = match select(
            CONTROL.wait(),
            sta_future(&mut controller, enabled, connected),
        )
        .await
        {
            Either::First(control) => control,
            Either::Second(event) => {
                connected = matches!(event, StaEvent::Connected);
                continue;
            }
        };
        debug!("Info:  WiFi control signal received: {control:?}");

        let want = control == Control::Enable;
        if want == enabled {
            warn!("Warn:  WiFi station already in requested state, ignoring {control:?}");
        } else {
            let result = if want {
                start_station(&mut controller).await
            } else {
                stop_station(&mut controller).await
            };
            match result {
                Ok(()) => {
                    enabled = want;
                    connected = false;
                }
                Err(e) => warn!("Error: Failed to reconfigure WiFi: {e}"),
            }
        }

        // Always report back, so callers of `control_and_wait` don't hang
        STATUS.signal(if enabled {
            Status::Enabled
        } else {
            Status::Disabled
        });
    }
}

async fn start_station(controller: &mut WifiController<'static>) -> Result<(), Error> {
    controller
        .set_mode(WifiMode::Sta)
        .map_err(|e| Error::Wifi(format!("Failed to set WiFi mode: {e:?}")))?;
    debug!("Ok:    WiFi mode set to {:?}", WifiMode::Sta);

    controller
        .start_async()
        .await
        .map_err(|e| Error::Wifi(format!("Failed to start WiFi: {e:?}")))?;
    info!("Ok:    WiFi station started");
    Ok(())
}

async fn stop_station(controller: &mut WifiController<'static>) -> Result<(), Error> {
    match controller.is_started() {
        Ok(true) => {
            info!("Exec:  Stopping WiFi station");
            controller
                .stop_async()
                .await
                .map_err(|e| Error::Wifi(format!("Failed to stop WiFi: {e:?}")))?;
            debug!("Ok:    WiFi stopped");
            Ok(())
        }
        Ok(false) => {
            trace!("Info:  WiFi already stopped");
            Ok(())
        }
        Err(e) => Err(Error::Wifi(format!("Failed to check WiFi state: {e:?}"))),
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}
