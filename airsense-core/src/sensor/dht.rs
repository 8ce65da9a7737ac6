// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - DHT11/DHT22 frame decoding
//!
//! DHT sensors answer a start signal with 40 bits, MSB first:
//!
//! | byte | DHT11                   | DHT22                  |
//! |------|-------------------------|------------------------|
//! | 0    | humidity (integral)     | humidity high byte     |
//! | 1    | humidity (tenths)       | humidity low byte      |
//! | 2    | temperature (integral)  | temperature high byte  |
//! | 3    | temperature (tenths)    | temperature low byte   |
//! | 4    | checksum                | checksum               |
//!
//! A bit is sent as ~50us low followed by a high pulse - ~27us for a 0 and
//! ~70us for a 1.  Measuring the pulses is left to the driver; this module
//! turns the measured bits into a [`Climate`].

use core::fmt;
use serde::{Deserialize, Serialize};

use super::{Climate, SensorError};

/// Number of bits in a DHT response
pub const FRAME_BITS: usize = 40;

/// High pulses longer than this are a 1, shorter are a 0.
pub const BIT_THRESHOLD_US: u32 = 40;

/// Minimum time between two transactions.  Reads within this window should
/// be served from the previous frame.
pub const MIN_INTERVAL_MS: u64 = 2000;

/// How long the host holds the data line low to wake the sensor.
pub const START_SIGNAL_MS: u64 = 18;

/// Supported DHT sensor variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DhtKind {
    #[default]
    Dht11,
    Dht22,
}

impl fmt::Display for DhtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhtKind::Dht11 => write!(f, "DHT11"),
            DhtKind::Dht22 => write!(f, "DHT22"),
        }
    }
}

/// Packs 40 received bits, MSB first, into the 5 byte frame.
pub fn bits_to_frame(bits: &[bool; FRAME_BITS]) -> [u8; 5] {
    let mut frame = [0u8; 5];
    for (ii, bit) in bits.iter().enumerate() {
        if *bit {
            frame[ii / 8] |= 0x80 >> (ii % 8);
        }
    }
    frame
}

/// Decodes a 5 byte frame from a sensor of type `kind`.
///
/// Returns:
/// - `Ok(Climate)` if the checksum matches
/// - `Err(SensorError::Checksum)` if it does not
/// - `Err(SensorError::InvalidData)` if the humidity is above 100%
pub fn decode(kind: DhtKind, frame: [u8; 5]) -> Result<Climate, SensorError> {
    let sum = frame[..4]
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    if sum != frame[4] {
        return Err(SensorError::Checksum);
    }

    let climate = match kind {
        DhtKind::Dht11 => {
            let humidity = frame[0] as f32 + frame[1] as f32 * 0.1;
            let mut temperature = frame[2] as f32 + (frame[3] & 0x7f) as f32 * 0.1;
            if frame[3] & 0x80 != 0 {
                temperature = -temperature;
            }
            Climate {
                temperature,
                humidity,
            }
        }
        DhtKind::Dht22 => {
            let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f32 * 0.1;
            let mut temperature = u16::from_be_bytes([frame[2] & 0x7f, frame[3]]) as f32 * 0.1;
            if frame[2] & 0x80 != 0 {
                temperature = -temperature;
            }
            Climate {
                temperature,
                humidity,
            }
        }
    };

    if climate.humidity > 100.0 {
        return Err(SensorError::InvalidData);
    }

    Ok(climate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.001
    }

    fn with_checksum(bytes: [u8; 4]) -> [u8; 5] {
        let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        [bytes[0], bytes[1], bytes[2], bytes[3], sum]
    }

    #[test]
    fn packs_bits_msb_first() {
        let mut bits = [false; FRAME_BITS];
        bits[0] = true; // 0x80 in byte 0
        bits[15] = true; // 0x01 in byte 1
        bits[38] = true; // 0x02 in byte 4
        assert_eq!(bits_to_frame(&bits), [0x80, 0x01, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn decodes_dht11() {
        let climate = decode(DhtKind::Dht11, with_checksum([55, 0, 23, 4])).unwrap();
        assert!(close(climate.humidity, 55.0));
        assert!(close(climate.temperature, 23.4));
    }

    #[test]
    fn decodes_dht11_negative_temperature() {
        let climate = decode(DhtKind::Dht11, with_checksum([40, 0, 2, 0x85])).unwrap();
        assert!(close(climate.temperature, -2.5));
    }

    #[test]
    fn decodes_dht22() {
        // 65.2% and 35.1C
        let climate = decode(DhtKind::Dht22, with_checksum([0x02, 0x8c, 0x01, 0x5f])).unwrap();
        assert!(close(climate.humidity, 65.2));
        assert!(close(climate.temperature, 35.1));

        // -10.1C
        let climate = decode(DhtKind::Dht22, with_checksum([0x02, 0x8c, 0x80, 0x65])).unwrap();
        assert!(close(climate.temperature, -10.1));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut frame = with_checksum([55, 0, 23, 4]);
        frame[4] ^= 0x01;
        assert_eq!(decode(DhtKind::Dht11, frame), Err(SensorError::Checksum));
    }

    #[test]
    fn rejects_impossible_humidity() {
        let frame = with_checksum([0x03, 0xe9, 0x00, 0xc8]);
        assert_eq!(decode(DhtKind::Dht22, frame), Err(SensorError::InvalidData));
    }
}
