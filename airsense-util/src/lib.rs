// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense is a tiny WiFi air quality station.
//!
//! airsense-util - ESP32 helpers for building airsense firmware.
//!
//! [`net`] - brings up the WiFi station interface and its network stack,
//! using `esp-wifi` and `embassy-net`, and reports association status to
//! `airsense-core`.

#![no_std]
#![feature(type_alias_impl_trait)]
#![feature(impl_trait_in_assoc_type)]

extern crate alloc;

pub mod net;
