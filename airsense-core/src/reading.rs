// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Readings and the wire record
//!
//! A [`Reading`] is built once per poll cycle and turned into a [`Record`],
//! which is what listeners receive:
//!
//! ```text
//! {"temperature":23.40,"humidity":55.00,"aqi":25.00}
//! ```
//!
//! Values are written with two decimal places.  A failed temperature or
//! humidity read is sent as `nan` - the record is not sanitized, so listeners
//! see exactly what the sensor returned.

use alloc::string::String;
use core::fmt::{self, Write};
use serde::{Deserialize, Serialize};

use crate::aqi::{AqiCategory, BreakpointTable};
use crate::sensor::SensorError;

/// One poll cycle's worth of sensor data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius, NaN if the read failed
    pub temperature: f32,

    /// Percent relative humidity, NaN if the read failed
    pub humidity: f32,

    /// Gas concentration, 0 if the read failed
    pub concentration_ppm: f32,

    /// AQI derived from `concentration_ppm`
    pub aqi: f32,
}

impl Reading {
    /// Builds a reading from raw sensor results.
    ///
    /// Temperature and humidity failures become NaN.  A failed or NaN gas
    /// read becomes 0ppm (and therefore AQI 0) before the AQI is derived
    /// using `table`.
    pub fn from_samples(
        temperature: Result<f32, SensorError>,
        humidity: Result<f32, SensorError>,
        ppm: Result<f32, SensorError>,
        table: &BreakpointTable<'_>,
    ) -> Self {
        let concentration_ppm = normalize_ppm(ppm);
        Self {
            temperature: temperature.unwrap_or(f32::NAN),
            humidity: humidity.unwrap_or(f32::NAN),
            concentration_ppm,
            aqi: table.map(concentration_ppm),
        }
    }

    /// The band this reading's AQI falls in.
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi)
    }

    /// The fields of this reading that are sent to listeners.
    pub fn record(&self) -> Record {
        Record {
            temperature: self.temperature,
            humidity: self.humidity,
            aqi: self.aqi,
        }
    }
}

/// Collapses a failed or NaN gas read to 0ppm.
pub fn normalize_ppm(ppm: Result<f32, SensorError>) -> f32 {
    match ppm {
        Ok(ppm) if !ppm.is_nan() => ppm,
        _ => 0.0,
    }
}

/// The record broadcast to listeners.
///
/// Use [`Record::to_wire`] (or `Display`) to produce the text sent on the
/// wire - it always has exactly these three fields, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub temperature: f32,
    pub humidity: f32,
    pub aqi: f32,
}

impl Record {
    /// Renders the record as sent to listeners.
    pub fn to_wire(&self) -> String {
        let mut wire = String::with_capacity(64);
        // Writing to a String cannot fail
        let _ = write!(wire, "{self}");
        wire
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"temperature\":{},\"humidity\":{},\"aqi\":{}}}",
            WireFloat(self.temperature),
            WireFloat(self.humidity),
            WireFloat(self.aqi)
        )
    }
}

// Formats an f32 the way the record carries it - two decimal places, with
// non-finite values as nan/inf/-inf.
struct WireFloat(f32);

impl fmt::Display for WireFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value.is_nan() {
            f.write_str("nan")
        } else if value.is_infinite() {
            f.write_str(if value > 0.0 { "inf" } else { "-inf" })
        } else {
            write!(f, "{value:.2}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        let record = Record {
            temperature: 23.4,
            humidity: 55.0,
            aqi: 25.0,
        };
        assert_eq!(
            record.to_wire(),
            "{\"temperature\":23.40,\"humidity\":55.00,\"aqi\":25.00}"
        );
    }

    #[test]
    fn wire_format_passes_nan_through() {
        let record = Record {
            temperature: f32::NAN,
            humidity: f32::NAN,
            aqi: 0.0,
        };
        assert_eq!(
            record.to_wire(),
            "{\"temperature\":nan,\"humidity\":nan,\"aqi\":0.00}"
        );
    }

    #[test]
    fn wire_format_infinities() {
        let record = Record {
            temperature: f32::INFINITY,
            humidity: f32::NEG_INFINITY,
            aqi: 500.0,
        };
        assert_eq!(
            record.to_wire(),
            "{\"temperature\":inf,\"humidity\":-inf,\"aqi\":500.00}"
        );
    }

    #[test]
    fn record_is_json_when_finite() {
        let record = Record {
            temperature: -4.25,
            humidity: 80.5,
            aqi: 75.459,
        };
        let parsed: Record = serde_json::from_str(&record.to_wire()).unwrap();
        assert_eq!(parsed.temperature, -4.25);
        assert_eq!(parsed.humidity, 80.5);
        assert!((parsed.aqi - 75.46).abs() < 0.001);
    }

    #[test]
    fn gas_failure_becomes_zero() {
        assert_eq!(normalize_ppm(Ok(f32::NAN)), 0.0);
        assert_eq!(normalize_ppm(Err(SensorError::Adc)), 0.0);
        assert_eq!(normalize_ppm(Ok(612.5)), 612.5);
    }

    #[test]
    fn reading_from_samples() {
        let reading = Reading::from_samples(
            Err(SensorError::Timeout),
            Ok(41.0),
            Ok(f32::NAN),
            &BreakpointTable::CO2,
        );
        assert!(reading.temperature.is_nan());
        assert_eq!(reading.humidity, 41.0);
        assert_eq!(reading.concentration_ppm, 0.0);
        assert_eq!(reading.aqi, 0.0);
        assert_eq!(reading.category(), AqiCategory::Good);

        let reading = Reading::from_samples(Ok(21.0), Ok(40.0), Ok(200.0), &BreakpointTable::CO2);
        assert_eq!(reading.aqi, 25.0);
        assert_eq!(reading.record().aqi, 25.0);
    }
}
