// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Station and association tests, using fake sensors, broadcaster and delay.

use std::collections::VecDeque;

use airsense_core::config::AssociationPolicy;
use airsense_core::{
    AssociationProvider, BreakpointTable, Broadcaster, Error, GasConcentrationSource, Record,
    SensorError, Station, StationConfig, TemperatureHumiditySource, wait_for_association,
};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;

#[derive(Default)]
struct FakeClimate {
    temperatures: VecDeque<Result<f32, SensorError>>,
    humidities: VecDeque<Result<f32, SensorError>>,
}

impl TemperatureHumiditySource for FakeClimate {
    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.temperatures.pop_front().unwrap_or(Ok(21.0))
    }

    async fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.humidities.pop_front().unwrap_or(Ok(45.0))
    }
}

#[derive(Default)]
struct FakeGas {
    samples: VecDeque<Result<f32, SensorError>>,
}

impl GasConcentrationSource for FakeGas {
    async fn read_ppm(&mut self) -> Result<f32, SensorError> {
        self.samples.pop_front().unwrap_or(Ok(200.0))
    }
}

#[derive(Default)]
struct FakeBroadcaster {
    sent: Vec<String>,
    // Record count at each service call, to check ordering
    serviced: Vec<usize>,
}

impl Broadcaster for FakeBroadcaster {
    async fn broadcast(&mut self, record: &str) {
        self.sent.push(record.to_string());
    }

    async fn service(&mut self) {
        self.serviced.push(self.sent.len());
    }
}

#[derive(Default)]
struct FakeDelay {
    sleeps_ms: Vec<u32>,
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        panic!("station only sleeps in milliseconds");
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.sleeps_ms.push(ms);
    }
}

struct FakeNetwork {
    checks: u32,
    associated_on: Option<u32>,
}

impl AssociationProvider for FakeNetwork {
    async fn is_associated(&mut self) -> bool {
        self.checks += 1;
        self.associated_on.is_some_and(|n| self.checks >= n)
    }
}

fn station(
    climate: FakeClimate,
    gas: FakeGas,
) -> Station<'static, FakeClimate, FakeGas, FakeBroadcaster, FakeDelay> {
    Station::new(
        &StationConfig::default(),
        BreakpointTable::CO2,
        climate,
        gas,
        FakeBroadcaster::default(),
        FakeDelay::default(),
    )
}

#[test]
fn cycle_broadcasts_one_record_then_sleeps() {
    let mut station = station(FakeClimate::default(), FakeGas::default());

    let reading = block_on(station.cycle());

    assert_eq!(reading.aqi, 25.0);
    assert_eq!(
        station.broadcaster().sent,
        vec!["{\"temperature\":21.00,\"humidity\":45.00,\"aqi\":25.00}".to_string()]
    );
    assert_eq!(station.broadcaster().serviced, vec![1]);
    assert_eq!(station.delay().sleeps_ms, vec![9000]);
    assert_eq!(station.cycles(), 1);
}

#[test]
fn every_cycle_sleeps_the_poll_interval() {
    let config = StationConfig {
        poll_interval_ms: 1500,
        ..StationConfig::default()
    };
    let mut station = Station::new(
        &config,
        BreakpointTable::CO2,
        FakeClimate::default(),
        FakeGas::default(),
        FakeBroadcaster::default(),
        FakeDelay::default(),
    );

    for _ in 0..3 {
        block_on(station.cycle());
    }

    assert_eq!(station.broadcaster().sent.len(), 3);
    assert_eq!(station.broadcaster().serviced, vec![1, 2, 3]);
    assert_eq!(station.delay().sleeps_ms, vec![1500, 1500, 1500]);
}

#[test]
fn poll_once_does_not_sleep() {
    let mut station = station(FakeClimate::default(), FakeGas::default());
    block_on(station.poll_once());
    assert!(station.delay().sleeps_ms.is_empty());
}

#[test]
fn nan_gas_read_reports_zero_aqi() {
    let gas = FakeGas {
        samples: VecDeque::from([Ok(f32::NAN)]),
    };
    let mut station = station(FakeClimate::default(), gas);

    let reading = block_on(station.poll_once());

    assert_eq!(reading.concentration_ppm, 0.0);
    assert_eq!(reading.aqi, 0.0);
    let record: Record = serde_json::from_str(&station.broadcaster().sent[0]).unwrap();
    assert_eq!(record.aqi, 0.0);
}

#[test]
fn failed_gas_read_reports_zero_aqi() {
    let gas = FakeGas {
        samples: VecDeque::from([Err(SensorError::Adc)]),
    };
    let mut station = station(FakeClimate::default(), gas);

    let reading = block_on(station.poll_once());

    assert_eq!(reading.aqi, 0.0);
}

#[test]
fn failed_climate_reads_pass_through_as_nan() {
    let climate = FakeClimate {
        temperatures: VecDeque::from([Err(SensorError::Timeout)]),
        humidities: VecDeque::from([Err(SensorError::Checksum)]),
    };
    let gas = FakeGas {
        samples: VecDeque::from([Ok(15000.0)]),
    };
    let mut station = station(climate, gas);

    let reading = block_on(station.poll_once());

    assert!(reading.temperature.is_nan());
    assert!(reading.humidity.is_nan());
    assert_eq!(
        station.broadcaster().sent[0],
        "{\"temperature\":nan,\"humidity\":nan,\"aqi\":500.00}"
    );
}

#[test]
fn record_has_three_fields_in_order() {
    let mut station = station(FakeClimate::default(), FakeGas::default());
    block_on(station.poll_once());

    let value: serde_json::Value = serde_json::from_str(&station.broadcaster().sent[0]).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 3);
    let sent = &station.broadcaster().sent[0];
    let temperature = sent.find("\"temperature\"").unwrap();
    let humidity = sent.find("\"humidity\"").unwrap();
    let aqi = sent.find("\"aqi\"").unwrap();
    assert!(temperature < humidity && humidity < aqi);
}

#[test]
fn association_succeeds_first_time_without_sleeping() {
    let mut network = FakeNetwork {
        checks: 0,
        associated_on: Some(1),
    };
    let mut delay = FakeDelay::default();

    let result = block_on(wait_for_association(
        &mut network,
        &mut delay,
        &AssociationPolicy::default(),
    ));

    assert_eq!(result, Ok(1));
    assert!(delay.sleeps_ms.is_empty());
}

#[test]
fn association_retries_until_associated() {
    let mut network = FakeNetwork {
        checks: 0,
        associated_on: Some(4),
    };
    let mut delay = FakeDelay::default();

    let result = block_on(wait_for_association(
        &mut network,
        &mut delay,
        &AssociationPolicy::default(),
    ));

    assert_eq!(result, Ok(4));
    assert_eq!(delay.sleeps_ms, vec![500, 500, 500]);
}

#[test]
fn association_times_out() {
    let mut network = FakeNetwork {
        checks: 0,
        associated_on: None,
    };
    let mut delay = FakeDelay::default();
    let policy = AssociationPolicy {
        poll_interval_ms: 100,
        max_attempts: 5,
    };

    let result = block_on(wait_for_association(&mut network, &mut delay, &policy));

    assert_eq!(result, Err(Error::AssociationTimeout { attempts: 5 }));
    assert_eq!(network.checks, 5);
    assert_eq!(delay.sleeps_ms.len(), 4);
}

#[test]
fn association_with_zero_attempts_checks_once() {
    let mut network = FakeNetwork {
        checks: 0,
        associated_on: None,
    };
    let mut delay = FakeDelay::default();
    let policy = AssociationPolicy {
        poll_interval_ms: 100,
        max_attempts: 0,
    };

    let result = block_on(wait_for_association(&mut network, &mut delay, &policy));

    assert_eq!(result, Err(Error::AssociationTimeout { attempts: 1 }));
    assert_eq!(network.checks, 1);
    assert!(delay.sleeps_ms.is_empty());
}
