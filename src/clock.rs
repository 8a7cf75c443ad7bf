//! Local wall-clock helpers shared by the evaluator and the arbiter.
//!
//! The node keeps its clock in **local** time (UTC + timezone offset + DST),
//! the same way the RTC chip is set.  Every timestamp stored by the core
//! (`lead_time`, `end_time`, `vacation_until`) is a local-epoch second count
//! produced by [`LocalTime::timestamp`], so comparisons never need a zone.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};

/// Minutes in a day.
pub const MINUTES_PER_DAY: i32 = 1440;

/// Seconds in a day.
pub const SECS_PER_DAY: u32 = 86_400;

/// Anything earlier than 2019-01-01 means the clock was never set.
pub const EARLIEST_VALID_EPOCH: i64 = 1_546_304_461;

/// A point in local time, as read from the clock on a seconds edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTime(NaiveDateTime);

impl LocalTime {
    pub fn new(local: NaiveDateTime) -> Self {
        Self(local)
    }

    /// Build from a local-epoch second count.
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp(secs, 0).map(|dt| Self(dt.naive_utc()))
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Local-epoch seconds.
    pub fn timestamp(&self) -> i64 {
        self.0.and_utc().timestamp()
    }

    /// Minute of the day, 0..1440.
    pub fn minute_of_day(&self) -> u16 {
        (self.0.hour() * 60 + self.0.minute()) as u16
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Calendar-day key used by the dusk/dawn latches.
    pub fn day_key(&self) -> i32 {
        self.0.date().num_days_from_ce()
    }

    /// Seconds left until the next local midnight (1..=86400).
    pub fn secs_until_midnight(&self) -> u32 {
        SECS_PER_DAY - self.0.num_seconds_from_midnight()
    }
}

/// Local-epoch timestamp of midnight at the start of `day_key`.
pub fn midnight_of(day_key: i32) -> Option<i64> {
    NaiveDate::from_num_days_from_ce_opt(day_key)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Add a (possibly negative) minute offset to a minute-of-day, wrapping.
pub fn wrap_minute(minute: i32, offset: i32) -> u16 {
    (minute + offset).rem_euclid(MINUTES_PER_DAY) as u16
}

/// Summer-time flag due at `now`, if `now` is a switch minute.
///
/// Summer time starts at 02:00 on the last Sunday of March and ends at
/// 03:00 on the last Sunday of October; the caller moves the clock by an
/// hour.  After the October switch the clock reads 02:00 again with the
/// flag already off, so the repeated hour does not switch twice.
pub fn summer_time_switch(now: LocalTime, dst: bool) -> Option<bool> {
    let t = now.naive();
    let last_sunday = t.weekday() == Weekday::Sun && t.day() > 24;
    if !last_sunday {
        return None;
    }
    match (t.month(), now.minute_of_day(), dst) {
        (3, 120, false) => Some(true),
        (10, 180, true) => Some(false),
        _ => None,
    }
}

/// Sunrise/sunset and civil dawn/dusk for one day, as minutes of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: u16,
    pub sunset: u16,
    pub dawn: u16,
    pub dusk: u16,
}

impl SunTimes {
    /// Calendar twilight: true between sunset and the next sunrise.
    pub fn is_night(&self, minute: u16) -> bool {
        if self.sunrise <= self.sunset {
            minute >= self.sunset || minute < self.sunrise
        } else {
            minute >= self.sunset && minute < self.sunrise
        }
    }
}

/// Seconds-edge detector for the cooperative run loop.
///
/// Returns `true` once per wall-clock (or uptime) second, so the control
/// pass runs exactly once per second however fast the loop spins.
#[derive(Debug, Default)]
pub struct SecondEdge {
    last: Option<i64>,
}

impl SecondEdge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, now_secs: i64) -> bool {
        if self.last == Some(now_secs) {
            return false;
        }
        self.last = Some(now_secs);
        true
    }
}
