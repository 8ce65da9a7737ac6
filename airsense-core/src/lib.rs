// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense is a tiny WiFi air quality station.
//!
//! airsense-core - The platform agnostic parts of the station:
//!
//! - [`aqi`] - maps a gas concentration onto the Air Quality Index.
//! - [`reading`] - a cycle's [`Reading`] and the [`Record`] sent to
//!   listeners.
//! - [`sensor`] - the sensor source traits, plus DHT and MQ-135 decoding.
//! - [`broadcast`] - the [`Broadcaster`] trait.
//! - [`associate`] - bounded wait for network association.
//! - [`station`] - the poll and broadcast loop.
//! - [`config`] - [`StationConfig`] and its defaults.
//!
//! This crate is `no_std` and requires an `alloc` implementation.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod aqi;
pub mod associate;
pub mod broadcast;
pub mod config;
mod error;
pub mod reading;
pub mod sensor;
pub mod station;

pub use aqi::{AqiCategory, BreakpointTable, Segment, TableError, map_to_aqi};
pub use associate::{AssociationProvider, wait_for_association};
pub use broadcast::Broadcaster;
pub use config::StationConfig;
pub use error::Error;
pub use reading::{Reading, Record};
pub use sensor::{GasConcentrationSource, SensorError, TemperatureHumiditySource};
pub use station::Station;
