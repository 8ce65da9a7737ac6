// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - MQ-135 driver
//!
//! The MQ-135's analog output is sampled by ADC1 at 11dB attenuation, so the
//! whole output range can be measured, and converted to ppm using
//! [`Mq135::ppm_from_raw`].

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO3};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use airsense_core::sensor::mq135::Mq135;
use airsense_core::sensor::{GasConcentrationSource, SensorError};

// 12-bit ADC
const ADC_FULL_SCALE: u16 = 4095;

pub(crate) struct Mq135Sensor<'d> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<GPIO3<'d>, ADC1<'d>>,
    model: Mq135,
}

impl<'d> Mq135Sensor<'d> {
    pub(crate) fn new(adc: ADC1<'d>, pin: GPIO3<'d>, model: Mq135) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(pin, Attenuation::_11dB);
        let adc = Adc::new(adc, config);

        debug!(
            "Info:  MQ-135 created, R0 {}kOhm RL {}kOhm",
            model.r_zero, model.r_load
        );

        Self { adc, pin, model }
    }
}

impl GasConcentrationSource for Mq135Sensor<'_> {
    async fn read_ppm(&mut self) -> Result<f32, SensorError> {
        let raw = nb::block!(self.adc.read_oneshot(&mut self.pin)).map_err(|_| SensorError::Adc)?;
        let ppm = self.model.ppm_from_raw(raw, ADC_FULL_SCALE);
        trace!("Info:  MQ-135 raw {raw} {ppm}ppm");
        Ok(ppm)
    }
}
