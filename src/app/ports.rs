//! Port traits: everything the thermostat core needs from the node.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Thermostat (domain)
//! ```
//!
//! Driven adapters (probe, relay, clock, event sinks, storage) implement
//! these traits.  The [`Thermostat`](super::service::Thermostat) consumes
//! them via generics, so the domain core never touches hardware directly.

use chrono::{NaiveDate, NaiveDateTime};

use crate::clock::SunTimes;

// ───────────────────────────────────────────────────────────────
// Temperature probe
// ───────────────────────────────────────────────────────────────

/// Raw reading the probe returns when it is disconnected.
pub const PROBE_DISCONNECTED: f32 = -127.0;

/// Read-side port: the domain calls this to obtain the room temperature.
pub trait SensorPort {
    /// Uncorrected probe reading in °C, or [`PROBE_DISCONNECTED`].
    fn read_raw_temperature(&mut self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Heating relay
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to drive the heating relay.
pub trait ActuatorPort {
    fn set_relay(&mut self, on: bool);

    /// Last commanded relay state.
    fn relay_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// RTC and sun table
// ───────────────────────────────────────────────────────────────

/// Local wall clock and sun times.
///
/// The clock holds **local** time.  `now()` returns `None` while the clock
/// is not running (never set, or lost after a power cut).
pub trait TimePort {
    fn now(&self) -> Option<NaiveDateTime>;

    /// Set the clock to a local date-time.
    fn set(&mut self, local: NaiveDateTime);

    /// Sunrise/sunset and civil dawn/dusk for a local date, if known.
    fn sun_times(&self, date: NaiveDate) -> Option<SunTimes>;
}

// ───────────────────────────────────────────────────────────────
// Outbound events
// ───────────────────────────────────────────────────────────────

/// Receives every [`AppEvent`](super::events::AppEvent) the thermostat
/// raises: state deltas, forwards and transitions.  Where they end up
/// (serial log, the outbound peer queue, a test recorder) is the
/// adapter's business.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Fan one event stream out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Flash records
// ───────────────────────────────────────────────────────────────

/// Named records on the node's flash: settings, their backup, the resume
/// snapshot and learned rule fields.
///
/// A record is replaced whole; after a power cut a reader sees either the
/// old bytes or the new ones.
pub trait StoragePort {
    /// Copy a record into `buf`; returns its length.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Removing a missing record is not an error.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Settings rejected by [`Settings::validate`](crate::config::Settings::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Names the field and its allowed range.
    ValidationFailed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    /// No room left for the record.
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "invalid setting: {msg}"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "flash I/O error"),
        }
    }
}
