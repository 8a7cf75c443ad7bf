//! Mock adapters for integration tests.
//!
//! Records every relay call and emitted event so tests can assert on the
//! full history without real GPIO, RTC or flash.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use thermonode::app::commands::{AppCommand, PayloadError};
use thermonode::app::events::{AppEvent, StateDelta};
use thermonode::app::ports::{
    ActuatorPort, EventSink, PROBE_DISCONNECTED, SensorPort, StorageError, StoragePort, TimePort,
};
use thermonode::app::service::Thermostat;
use thermonode::clock::SunTimes;
use thermonode::config::Settings;
use thermonode::drivers::button::ButtonEvent;
use thermonode::fsm::StateId;

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    /// Raw probe reading; `None` reads as disconnected.
    pub raw: Option<f32>,
    pub relay_calls: Vec<bool>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(raw: Option<f32>) -> Self {
        Self { raw, relay_calls: Vec::new() }
    }

    /// Raw reading that corrects to `celsius` with the default correction.
    pub fn reading(celsius: f32) -> Self {
        Self::new(Some(celsius + 3.5))
    }
}

impl SensorPort for MockHardware {
    fn read_raw_temperature(&mut self) -> f32 {
        self.raw.unwrap_or(PROBE_DISCONNECTED)
    }
}

impl ActuatorPort for MockHardware {
    fn set_relay(&mut self, on: bool) {
        self.relay_calls.push(on);
    }

    fn relay_on(&self) -> bool {
        self.relay_calls.last().copied().unwrap_or(false)
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// 2024-01-15 is a Monday.
pub const SUN: SunTimes = SunTimes { sunrise: 450, sunset: 990, dawn: 415, dusk: 1025 };

pub struct MockClock {
    pub now: Option<NaiveDateTime>,
    pub sun: Option<SunTimes>,
    pub sets: Vec<NaiveDateTime>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn stopped() -> Self {
        Self { now: None, sun: Some(SUN), sets: Vec::new() }
    }

    pub fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> Self {
        let now = NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(hh, mm, 0));
        Self { now, sun: Some(SUN), sets: Vec::new() }
    }

    /// Monday 2024-01-15 at `hh:mm`.
    pub fn monday(hh: u32, mm: u32) -> Self {
        Self::at(2024, 1, 15, hh, mm)
    }

    pub fn advance(&mut self, secs: i64) {
        if let Some(now) = self.now.as_mut() {
            *now += TimeDelta::seconds(secs);
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.now.map(|n| n.and_utc().timestamp())
    }
}

impl TimePort for MockClock {
    fn now(&self) -> Option<NaiveDateTime> {
        self.now
    }

    fn set(&mut self, local: NaiveDateTime) {
        self.now = Some(local);
        self.sets.push(local);
    }

    fn sun_times(&self, _date: NaiveDate) -> Option<SunTimes> {
        self.sun
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub writes: Vec<String>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&Vec<u8>> {
        self.store.get(&format!("{}::{}", namespace, key))
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get("thermo", key).map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn put_str(&mut self, key: &str, value: &str) {
        self.store.insert(format!("thermo::{}", key), value.as_bytes().to_vec());
    }

    pub fn writes_of(&self, key: &str) -> usize {
        self.writes.iter().filter(|k| k.as_str() == key).count()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.get(namespace, key) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.writes.push(key.to_string());
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.get(namespace, key).is_some()
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deltas(&self) -> Vec<&StateDelta> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Delta(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn transitions(&self) -> Vec<(StateId, StateId, &'static str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { from, to, reason } => Some((*from, *to, *reason)),
                _ => None,
            })
            .collect()
    }

    pub fn forwards(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Forward { address, payload } => Some((address.as_str(), payload.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Bench ─────────────────────────────────────────────────────

/// A booted thermostat wired to mock adapters.
pub struct Bench {
    pub thermostat: Thermostat,
    pub clock: MockClock,
    pub hw: MockHardware,
    pub nvs: MockNvs,
    pub sink: LogSink,
}

/// Settings JSON with `smart` as the rule set and defaults elsewhere.
pub fn settings_json(smart: &str) -> String {
    let settings = Settings { smart: smart.to_string(), ..Settings::default() };
    serde_json::to_string(&settings).unwrap()
}

#[allow(dead_code)]
impl Bench {
    pub fn boot(clock: MockClock, mut hw: MockHardware, mut nvs: MockNvs) -> Self {
        let mut sink = LogSink::new();
        let thermostat = Thermostat::boot(&mut nvs, &clock, &mut hw, &mut sink);
        Self { thermostat, clock, hw, nvs, sink }
    }

    /// Boot with `smart` stored as the rule set.
    pub fn with_rules(smart: &str, clock: MockClock, celsius: f32) -> Self {
        let mut nvs = MockNvs::new();
        nvs.put_str("settings", &settings_json(smart));
        Self::boot(clock, MockHardware::reading(celsius), nvs)
    }

    /// Power-cycle: a fresh thermostat over the same storage and clock.
    pub fn reboot(self) -> Self {
        let Self { clock, hw, nvs, .. } = self;
        Self::boot(clock, MockHardware { relay_calls: Vec::new(), ..hw }, nvs)
    }

    /// Run `secs` control passes, advancing the clock one second after each.
    pub fn run(&mut self, secs: u32) {
        for _ in 0..secs {
            self.thermostat.tick(&mut self.clock, &mut self.hw, &mut self.nvs, &mut self.sink);
            self.clock.advance(1);
        }
    }

    pub fn payload(&mut self, json: &str) -> Result<(), PayloadError> {
        self.thermostat
            .handle_payload_str(json, &mut self.clock, &mut self.hw, &mut self.nvs, &mut self.sink)
    }

    pub fn press(&mut self, event: ButtonEvent) {
        self.thermostat.handle_command(
            AppCommand::Button(event),
            &mut self.clock,
            &mut self.hw,
            &mut self.nvs,
            &mut self.sink,
        );
    }

    pub fn state(&self) -> StateId {
        self.thermostat.state()
    }

    pub fn last_transition(&self) -> Option<(StateId, StateId, &'static str)> {
        self.sink.transitions().last().copied()
    }
}
