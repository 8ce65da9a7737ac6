// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - The sensor poll and broadcast loop
//!
//! Each cycle the [`Station`]:
//! - reads temperature and humidity
//! - reads the gas concentration, collapsing a failed read to 0ppm
//! - maps the concentration to an AQI
//! - broadcasts the [`crate::reading::Record`] to all listeners
//! - services the broadcaster's listener events
//! - sleeps for the configured poll interval
//!
//! # Example
//! ```rust,ignore
//! let mut station = Station::new(
//!     &config,
//!     BreakpointTable::CO2,
//!     dht,
//!     mq135,
//!     broadcaster,
//!     embassy_time::Delay,
//! );
//! station.run().await
//! ```

use embedded_hal_async::delay::DelayNs;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::aqi::BreakpointTable;
use crate::broadcast::Broadcaster;
use crate::config::StationConfig;
use crate::reading::Reading;
use crate::sensor::{GasConcentrationSource, TemperatureHumiditySource};

/// The poll and broadcast loop, generic over its collaborators.
pub struct Station<'t, T, G, B, D> {
    table: BreakpointTable<'t>,
    poll_interval_ms: u32,
    climate: T,
    gas: G,
    broadcaster: B,
    delay: D,
    cycles: u64,
}

impl<'t, T, G, B, D> Station<'t, T, G, B, D>
where
    T: TemperatureHumiditySource,
    G: GasConcentrationSource,
    B: Broadcaster,
    D: DelayNs,
{
    /// Creates a new station.
    ///
    /// Arguments:
    /// - `config`: Station configuration - only the poll interval is used
    ///   here
    /// - `table`: The breakpoint table used to derive the AQI
    /// - `climate`: Temperature and humidity source
    /// - `gas`: Gas concentration source
    /// - `broadcaster`: Sends records to listeners
    /// - `delay`: Used to sleep between cycles
    pub fn new(
        config: &StationConfig,
        table: BreakpointTable<'t>,
        climate: T,
        gas: G,
        broadcaster: B,
        delay: D,
    ) -> Self {
        Self {
            table,
            poll_interval_ms: config.poll_interval_ms,
            climate,
            gas,
            broadcaster,
            delay,
            cycles: 0,
        }
    }

    /// Runs the station forever.
    pub async fn run(&mut self) -> ! {
        info!(
            "Exec:  Starting station, polling every {}ms",
            self.poll_interval_ms
        );
        loop {
            self.cycle().await;
        }
    }

    /// Runs a single cycle - [`Self::poll_once`] followed by the poll
    /// interval sleep.
    pub async fn cycle(&mut self) -> Reading {
        let reading = self.poll_once().await;
        self.delay.delay_ms(self.poll_interval_ms).await;
        reading
    }

    /// Reads the sensors, broadcasts the record and services listener
    /// events.  Does not sleep.
    pub async fn poll_once(&mut self) -> Reading {
        self.cycles += 1;

        let temperature = self
            .climate
            .read_temperature()
            .await
            .inspect_err(|e| warn!("Error: Temperature read failed: {e}"));
        let humidity = self
            .climate
            .read_humidity()
            .await
            .inspect_err(|e| warn!("Error: Humidity read failed: {e}"));
        let ppm = self
            .gas
            .read_ppm()
            .await
            .inspect_err(|e| warn!("Error: Gas concentration read failed: {e}"));
        if matches!(ppm, Ok(ppm) if ppm.is_nan()) {
            warn!("Warn:  Gas concentration read returned NaN, using 0ppm");
        }

        let reading = Reading::from_samples(temperature, humidity, ppm, &self.table);
        debug!(
            "Info:  Cycle {} {}ppm AQI {} ({})",
            self.cycles,
            reading.concentration_ppm,
            reading.aqi,
            reading.category()
        );

        let record = reading.record().to_wire();
        info!("Exec:  Sending data: {record}");
        self.broadcaster.broadcast(&record).await;
        self.broadcaster.service().await;

        reading
    }

    /// Number of cycles polled so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The station's broadcaster.
    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    /// The station's delay.
    pub fn delay(&self) -> &D {
        &self.delay
    }
}
