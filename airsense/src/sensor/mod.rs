// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - ESP32-C3 sensor drivers
//!
//! - [`dht::Dht`] - DHT11/DHT22 temperature and humidity sensor on a single
//!   GPIO.
//! - [`mq135::Mq135Sensor`] - MQ-135 gas sensor on an ADC1 channel.

pub(crate) mod dht;
pub(crate) mod mq135;

pub(crate) use dht::Dht;
pub(crate) use mq135::Mq135Sensor;
