// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Sensor sources
//!
//! The [`crate::station::Station`] reads its sensors through two traits, so
//! it can run against real hardware drivers on the device and against fakes
//! in tests:
//! - [`TemperatureHumiditySource`] - e.g. a DHT11 or DHT22.
//! - [`GasConcentrationSource`] - e.g. an MQ-135 on an ADC pin.
//!
//! The [`dht`] and [`mq135`] modules contain the hardware independent parts
//! of those two sensors' drivers.

use core::fmt;
use core::future::Future;
use serde::{Deserialize, Serialize};

pub mod dht;
pub mod mq135;

/// Error type for sensor reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Sensor did not respond, or a response bit did not arrive, in time
    Timeout,

    /// Sensor response failed its checksum
    Checksum,

    /// Sensor returned a value that cannot be a valid reading
    InvalidData,

    /// The ADC failed to produce a sample
    Adc,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Timeout => write!(f, "sensor timeout"),
            SensorError::Checksum => write!(f, "sensor checksum mismatch"),
            SensorError::InvalidData => write!(f, "invalid sensor data"),
            SensorError::Adc => write!(f, "ADC read failed"),
        }
    }
}

/// A combined temperature and relative humidity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Climate {
    /// Degrees Celsius
    pub temperature: f32,

    /// Percent relative humidity
    pub humidity: f32,
}

/// A source of temperature and humidity readings.
///
/// Each value is read separately and either may fail on its own.  Sources are
/// expected to return promptly - the station does not retry.
pub trait TemperatureHumiditySource {
    /// Reads the temperature, in degrees Celsius.
    fn read_temperature(&mut self) -> impl Future<Output = Result<f32, SensorError>>;

    /// Reads the relative humidity, in percent.
    fn read_humidity(&mut self) -> impl Future<Output = Result<f32, SensorError>>;
}

/// A source of gas concentration readings.
pub trait GasConcentrationSource {
    /// Reads the gas concentration in parts per million.  May return NaN if
    /// the sensor produced no usable sample.
    fn read_ppm(&mut self) -> impl Future<Output = Result<f32, SensorError>>;
}
