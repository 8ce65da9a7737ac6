// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - DHT11/DHT22 driver
//!
//! The DHT's single-wire protocol:
//! - host pulls the line low for at least 18ms, then releases it
//! - sensor answers with ~80us low then ~80us high
//! - sensor sends 40 bits, each a ~50us low followed by a high lasting
//!   ~27us for a 0 and ~70us for a 1
//!
//! The bits are timed with interrupts disabled.  One transaction yields both
//! temperature and humidity, and the sensor must not be read more than once
//! every 2s, so the last result is cached.

use embassy_time::{Duration, Instant, Timer};
use esp_hal::gpio::{DriveMode, Flex, InputConfig, InputPin, OutputConfig, OutputPin, Pull};
use esp_hal::time::Instant as HalInstant;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use airsense_core::sensor::dht::{
    self, BIT_THRESHOLD_US, DhtKind, FRAME_BITS, MIN_INTERVAL_MS, START_SIGNAL_MS,
};
use airsense_core::sensor::{Climate, SensorError, TemperatureHumiditySource};

// Time the host keeps the line released before the sensor responds.
const RELEASE_US: u64 = 30;

// Longest any single level is expected to last.
const LEVEL_TIMEOUT_US: u64 = 100;

pub(crate) struct Dht<'d> {
    pin: Flex<'d>,
    kind: DhtKind,
    last: Option<(Instant, Result<Climate, SensorError>)>,
}

impl<'d> Dht<'d> {
    /// Creates a new DHT driver on `pin`.  The data line is driven open drain
    /// and idles high.
    pub(crate) fn new(pin: impl InputPin + OutputPin + 'd, kind: DhtKind) -> Self {
        let mut pin = Flex::new(pin);
        let input_config = InputConfig::default().with_pull(Pull::Up);
        pin.apply_input_config(&input_config);
        let output_config = OutputConfig::default().with_drive_mode(DriveMode::OpenDrain);
        pin.apply_output_config(&output_config);
        pin.set_high();
        pin.set_output_enable(true);
        pin.set_input_enable(true);

        debug!("Info:  {kind} created, data line open drain, idle high");

        Self {
            pin,
            kind,
            last: None,
        }
    }

    // Returns the cached result if it is recent enough, otherwise reads the
    // sensor.
    async fn climate(&mut self) -> Result<Climate, SensorError> {
        if let Some((at, result)) = self.last
            && at.elapsed() < Duration::from_millis(MIN_INTERVAL_MS)
        {
            return result;
        }

        let result = self.transaction().await;
        match &result {
            Ok(climate) => trace!(
                "Ok:    {} read {}C {}%",
                self.kind, climate.temperature, climate.humidity
            ),
            Err(e) => debug!("Error: {} read failed: {e}", self.kind),
        }
        self.last = Some((Instant::now(), result));
        result
    }

    async fn transaction(&mut self) -> Result<Climate, SensorError> {
        self.pin.set_low();
        Timer::after_millis(START_SIGNAL_MS).await;

        let bits = critical_section::with(|_| self.read_bits());

        // Always leave the line released
        self.pin.set_high();

        let frame = dht::bits_to_frame(&bits?);
        dht::decode(self.kind, frame)
    }

    fn read_bits(&mut self) -> Result<[bool; FRAME_BITS], SensorError> {
        self.pin.set_high();
        busy_wait_us(RELEASE_US);

        // Response
        self.wait_for(false)?;
        self.wait_for(true)?;
        self.wait_for(false)?;

        let mut bits = [false; FRAME_BITS];
        for bit in bits.iter_mut() {
            self.wait_for(true)?;
            let high_us = self.wait_for(false)?;
            *bit = high_us > BIT_THRESHOLD_US as u64;
        }
        Ok(bits)
    }

    // Waits for the line to reach `high`, returning how long that took in
    // microseconds.
    fn wait_for(&self, high: bool) -> Result<u64, SensorError> {
        let start = HalInstant::now();
        loop {
            let elapsed = start.elapsed().as_micros();
            if self.pin.is_high() == high {
                return Ok(elapsed);
            }
            if elapsed > LEVEL_TIMEOUT_US {
                return Err(SensorError::Timeout);
            }
        }
    }
}

fn busy_wait_us(us: u64) {
    let start = HalInstant::now();
    while start.elapsed().as_micros() < us {}
}

impl TemperatureHumiditySource for Dht<'_> {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.climate().await.map(|c| c.temperature)
    }

    async fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.climate().await.map(|c| c.humidity)
    }
}
