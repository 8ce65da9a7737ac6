// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - MQ-135 gas sensor conversion
//!
//! The MQ-135's sensing resistance `Rs` falls as the gas concentration rises.
//! It sits in a voltage divider with a load resistor `RL`, so an ADC sample
//! of the divider's output gives `Rs`, and the ratio `Rs / R0` (where `R0` is
//! the resistance in clean air) gives the concentration via the datasheet's
//! CO2 curve:
//!
//! `ppm = PARA * (Rs / R0) ^ -PARB`

use serde::{Deserialize, Serialize};

/// Curve scaling factor for CO2
pub const PARA: f32 = 116.602_07;

/// Curve exponent for CO2
pub const PARB: f32 = 2.769_035;

/// Default sensor resistance in clean air, kOhm
pub const DEFAULT_R_ZERO: f32 = 76.63;

/// Default load resistance on the sensor board, kOhm
pub const DEFAULT_R_LOAD: f32 = 10.0;

/// Converts MQ-135 ADC samples into a CO2 concentration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mq135 {
    /// Sensor resistance in clean air, kOhm
    pub r_zero: f32,

    /// Load resistance, kOhm
    pub r_load: f32,
}

impl Default for Mq135 {
    fn default() -> Self {
        Self {
            r_zero: DEFAULT_R_ZERO,
            r_load: DEFAULT_R_LOAD,
        }
    }
}

impl Mq135 {
    /// Returns the sensor resistance, in kOhm, for an ADC sample `raw` out
    /// of `full_scale`.  NaN if `raw` is 0, as the sensor is then most likely
    /// disconnected.
    pub fn resistance(&self, raw: u16, full_scale: u16) -> f32 {
        if raw == 0 {
            return f32::NAN;
        }
        (full_scale as f32 / raw as f32 - 1.0) * self.r_load
    }

    /// Returns the CO2 concentration for a sensor resistance in kOhm.
    pub fn ppm_from_resistance(&self, resistance: f32) -> f32 {
        PARA * libm::powf(resistance / self.r_zero, -PARB)
    }

    /// Returns the CO2 concentration for an ADC sample `raw` out of
    /// `full_scale`.  NaN if `raw` is 0.
    pub fn ppm_from_raw(&self, raw: u16, full_scale: u16) -> f32 {
        self.ppm_from_resistance(self.resistance(raw, full_scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_air_resistance_gives_curve_scale() {
        let sensor = Mq135::default();
        let ppm = sensor.ppm_from_resistance(DEFAULT_R_ZERO);
        assert!((ppm - PARA).abs() < 0.001);
    }

    #[test]
    fn resistance_from_divider() {
        let sensor = Mq135::default();
        // Half scale - Rs equals RL
        assert!((sensor.resistance(2048, 4096) - DEFAULT_R_LOAD).abs() < 0.001);
        assert!(sensor.resistance(0, 4096).is_nan());
        assert!(sensor.ppm_from_raw(0, 4096).is_nan());
    }

    #[test]
    fn concentration_rises_with_sample() {
        let sensor = Mq135::default();
        let low = sensor.ppm_from_raw(500, 4095);
        let high = sensor.ppm_from_raw(2000, 4095);
        assert!(low > 0.0);
        assert!(high > low);
    }
}
