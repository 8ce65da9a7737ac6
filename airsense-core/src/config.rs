// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Station configuration
//!
//! [`StationConfig`] gathers everything the firmware used to hard code -
//! network credentials, the listener port, sensor pins and type, the poll
//! interval and the association retry policy - into one value that is handed
//! to the station at startup.  [`StationConfig::default`] documents the
//! defaults.

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::sensor::dht::DhtKind;

/// Port the WebSocket server listens on.
pub const DEFAULT_SERVER_PORT: u16 = 81;

/// Time between two poll cycles.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 9000;

/// GPIO carrying the DHT data line.
pub const DEFAULT_CLIMATE_PIN: u8 = 5;

/// GPIO connected to the MQ-135 analog output.  Must be an ADC1 channel.
pub const DEFAULT_GAS_PIN: u8 = 3;

/// Time between two association checks at startup.
pub const DEFAULT_ASSOCIATION_POLL_MS: u32 = 500;

/// Number of association checks before startup is abandoned (30s in total
/// with the default poll time).
pub const DEFAULT_ASSOCIATION_ATTEMPTS: u32 = 60;

/// WiFi station credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    /// SSID of the network to join
    pub ssid: String,

    /// Passphrase of the network to join
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // DO NOT output the password
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

/// GPIO numbers of the two sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPins {
    /// DHT data line
    pub climate: u8,

    /// MQ-135 analog output
    pub gas: u8,
}

impl Default for SensorPins {
    fn default() -> Self {
        Self {
            climate: DEFAULT_CLIMATE_PIN,
            gas: DEFAULT_GAS_PIN,
        }
    }
}

/// How long to wait for the network at startup.  See
/// [`crate::associate::wait_for_association`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationPolicy {
    /// Time between two checks
    pub poll_interval_ms: u32,

    /// Maximum number of checks.  0 is treated as 1.
    pub max_attempts: u32,
}

impl Default for AssociationPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_ASSOCIATION_POLL_MS,
            max_attempts: DEFAULT_ASSOCIATION_ATTEMPTS,
        }
    }
}

/// Air quality station configuration.
///
/// Defaults:
/// - `wifi` - empty SSID and password; the firmware fills these in from its
///   build environment
/// - `server_port` - [`DEFAULT_SERVER_PORT`] (81)
/// - `poll_interval_ms` - [`DEFAULT_POLL_INTERVAL_MS`] (9s)
/// - `pins` - [`DEFAULT_CLIMATE_PIN`] (GPIO5) and [`DEFAULT_GAS_PIN`] (GPIO3)
/// - `climate_sensor` - [`DhtKind::Dht11`]
/// - `association` - 60 checks, 500ms apart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub wifi: WifiCredentials,
    pub server_port: u16,
    pub poll_interval_ms: u32,
    pub pins: SensorPins,
    pub climate_sensor: DhtKind,
    pub association: AssociationPolicy,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            wifi: WifiCredentials::default(),
            server_port: DEFAULT_SERVER_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            pins: SensorPins::default(),
            climate_sensor: DhtKind::default(),
            association: AssociationPolicy::default(),
        }
    }
}

impl StationConfig {
    /// Returns the default configuration with the given WiFi credentials.
    pub fn with_wifi(ssid: &str, password: &str) -> Self {
        Self {
            wifi: WifiCredentials {
                ssid: String::from(ssid),
                password: String::from(password),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn defaults() {
        let config = StationConfig::default();
        assert_eq!(config.server_port, 81);
        assert_eq!(config.poll_interval_ms, 9000);
        assert_eq!(config.pins, SensorPins { climate: 5, gas: 3 });
        assert_eq!(config.climate_sensor, DhtKind::Dht11);
        assert_eq!(config.association.poll_interval_ms, 500);
        assert_eq!(config.association.max_attempts, 60);
        assert!(config.wifi.ssid.is_empty());
    }

    #[test]
    fn debug_hides_password() {
        let config = StationConfig::with_wifi("home", "hunter22");
        let debug = format!("{config:?}");
        assert!(debug.contains("home"));
        assert!(!debug.contains("hunter22"));
    }
}
