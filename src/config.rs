//! Durable node settings.
//!
//! Stored as JSON under the `settings` record (mirrored to `backup`).  Key
//! names are the ones peers and older firmware already use, so a settings
//! file written by an older node loads unchanged.  A missing `ver` key marks
//! the pre-versioned format whose `smart` field still holds a legacy
//! schedule (see [`crate::rules::legacy`]).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::clock::LocalTime;

/// Current settings format version.
pub const SETTINGS_VERSION: u16 = 2;

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Format marker; `None` when loaded from a legacy file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<u16>,

    // --- Rules ---
    /// Rule-set string, definition form (no lead-time tokens).
    pub smart: String,
    /// Rules are held off until the next sunrise or sunset.
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub smart_lock: bool,

    // --- Clock ---
    /// Timezone offset from UTC in seconds.
    pub offset: i32,
    /// Daylight saving time in effect (+1 h).
    pub dst: bool,

    // --- Heating ---
    /// Failsafe minimum temperature (°C).
    pub minimum: f32,
    /// Long-press boost above the current temperature (°C).
    pub plustemp: f32,
    /// Single-press heating duration (s).
    pub plustime: u32,
    /// Schedule debounce applied after cancelling a rule-owned session (s).
    #[serde(rename = "downtime")]
    pub downtime_plus: u32,
    /// Vacation end, local epoch seconds; 0 = inactive.
    pub vacation: i64,
    pub key_lock: bool,

    // --- Sensors ---
    /// Offset added to the raw probe reading (°C).
    pub correction: f32,
    /// Last known sensor twilight flag.
    pub sensor_twilight: bool,

    // --- Housekeeping ---
    /// Boot counter.
    pub uprisings: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ver: Some(SETTINGS_VERSION),
            smart: String::new(),
            smart_lock: false,
            offset: 0,
            dst: false,
            minimum: 7.0,
            plustemp: 1.0,
            plustime: 600,
            downtime_plus: 10_800,
            vacation: 0,
            key_lock: false,
            correction: -3.5,
            sensor_twilight: false,
            uprisings: 0,
        }
    }
}

impl Settings {
    /// Whether this was loaded from the pre-versioned format.
    pub fn is_legacy(&self) -> bool {
        self.ver.is_none()
    }

    /// Seconds to add to UTC to get local time.
    pub fn utc_shift(&self) -> i64 {
        i64::from(self.offset) + if self.dst { 3600 } else { 0 }
    }

    /// Range-check every tunable before it is persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-14 * 3600..=14 * 3600).contains(&self.offset) {
            return Err(ConfigError::ValidationFailed("offset must be within ±14 h"));
        }
        if !self.minimum.is_finite() || !(-10.0..=30.0).contains(&self.minimum) {
            return Err(ConfigError::ValidationFailed("minimum must be -10.0–30.0"));
        }
        if !self.plustemp.is_finite() || !(0.0..=10.0).contains(&self.plustemp) {
            return Err(ConfigError::ValidationFailed("plustemp must be 0.0–10.0"));
        }
        if self.plustime > 86_400 {
            return Err(ConfigError::ValidationFailed("plustime must be at most one day"));
        }
        if self.downtime_plus > 7 * 86_400 {
            return Err(ConfigError::ValidationFailed("downtime must be at most one week"));
        }
        if self.vacation < 0 || LocalTime::from_timestamp(self.vacation).is_none() {
            return Err(ConfigError::ValidationFailed("vacation must be a valid epoch"));
        }
        if !self.correction.is_finite() || !(-20.0..=20.0).contains(&self.correction) {
            return Err(ConfigError::ValidationFailed("correction must be -20.0–20.0"));
        }
        Ok(())
    }
}
